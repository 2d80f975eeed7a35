use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::domain::{
    Account, ErrorOrigin, ProviderAvailability, SessionEvent, TransactionRequest, TxHash,
    TxOutcome, TxPolicy, WalletSession,
};
use crate::ports::ProviderPort;
use crate::probe::detect;
use crate::reconciler::EventReconciler;
use crate::state_machine::{
    connect_transition, send_transition, ConnectAction, ConnectPhase, SendAction, SendPhase,
};
use crate::store::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(Vec<Account>),
    Failed(String),
    /// Another connect was still outstanding; no request was issued.
    AlreadyConnecting,
    Unavailable,
    /// The session was torn down before the request or while it was outstanding.
    TornDown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent(TxHash),
    Failed(String),
    NoAccount,
}

/// Entry point for a wallet session: owns the store, the reconciler and the
/// two user intents.
pub struct SessionController<P: ProviderPort + ?Sized + 'static> {
    provider: Arc<P>,
    store: SessionStore,
    reconciler: Option<EventReconciler<P>>,
    policy: TxPolicy,
    connect_phase: Mutex<ConnectPhase>,
}

/// Clears `connecting` however the connect future ends, including being dropped.
/// A connect abandoned mid-request is recorded as failed.
struct ConnectingGuard<'a> {
    store: &'a SessionStore,
    phase: &'a Mutex<ConnectPhase>,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        let mut phase = lock_phase(self.phase);
        if *phase == ConnectPhase::Connecting {
            *phase = step_connect(*phase, ConnectAction::Fail);
        }
        drop(phase);
        self.store.finish_connect();
    }
}

impl<P: ProviderPort + ?Sized + 'static> SessionController<P> {
    pub async fn start(provider: Arc<P>) -> Self {
        Self::with_policy(provider, TxPolicy::DEFAULT).await
    }

    pub async fn with_policy(provider: Arc<P>, policy: TxPolicy) -> Self {
        let availability = detect(provider.as_ref()).await;
        tracing::info!(?availability, "wallet provider probed");
        let store = SessionStore::new(availability);
        let reconciler = if availability == ProviderAvailability::Present {
            Some(EventReconciler::start(Arc::clone(&provider), store.clone()).await)
        } else {
            None
        };
        Self {
            provider,
            store,
            reconciler,
            policy,
            connect_phase: Mutex::new(ConnectPhase::Idle),
        }
    }

    pub fn availability(&self) -> ProviderAvailability {
        self.store.snapshot().availability
    }

    pub fn snapshot(&self) -> WalletSession {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletSession> {
        self.store.subscribe()
    }

    /// `false` once [`SessionController::teardown`] has run.
    pub fn is_live(&self) -> bool {
        self.store.is_live()
    }

    /// Where the most recent connect attempt stands.
    pub fn connect_phase(&self) -> ConnectPhase {
        *lock_phase(&self.connect_phase)
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Waits until every provider event and connect result received so far is applied.
    pub async fn flush(&self) {
        if let Some(reconciler) = &self.reconciler {
            reconciler.flush().await;
        }
    }

    pub async fn connect(&self) -> ConnectOutcome {
        if !self.store.is_live() {
            tracing::debug!("connect after teardown; ignoring");
            return ConnectOutcome::TornDown;
        }
        let Some(reconciler) = &self.reconciler else {
            self.store.record_error(
                ErrorOrigin::Connect,
                "no compatible wallet provider detected",
            );
            return ConnectOutcome::Unavailable;
        };
        if !self.store.try_begin_connect() {
            tracing::debug!("connect already in flight; ignoring");
            return ConnectOutcome::AlreadyConnecting;
        }
        let _guard = ConnectingGuard {
            store: &self.store,
            phase: &self.connect_phase,
        };
        self.advance_connect(ConnectAction::Begin);

        let result = self.provider.request_accounts().await;
        self.advance_connect(if result.is_ok() {
            ConnectAction::Succeed
        } else {
            ConnectAction::Fail
        });
        if !self.store.is_live() {
            tracing::debug!("session torn down during connect; discarding result");
            return ConnectOutcome::TornDown;
        }

        match result {
            Ok(accounts) => {
                tracing::info!(accounts = accounts.len(), "wallet connected");
                self.store.clear_error();
                reconciler.enqueue(SessionEvent::AccountsChanged(accounts.clone()));
                ConnectOutcome::Connected(accounts)
            }
            Err(e) => {
                let message = e.provider_message();
                tracing::info!(error = %e, "wallet connect failed");
                self.store.record_error(ErrorOrigin::Connect, message.clone());
                ConnectOutcome::Failed(message)
            }
        }
    }

    /// Sends the fixed policy transfer from the primary account. Concurrent sends are
    /// not serialized; whichever finishes last owns `last_tx`. The send phase is
    /// therefore tracked per call and only logged.
    pub async fn send(&self, to_address: &str) -> SendOutcome {
        let Some(from) = self.store.snapshot().primary_account().cloned() else {
            self.store
                .set_tx_outcome(TxOutcome::Failed("no connected account".to_owned()));
            return SendOutcome::NoAccount;
        };
        let phase = step_send(SendPhase::Ready, SendAction::Submit);
        let tx = TransactionRequest::transfer(from, to_address, &self.policy);

        match self.provider.send_transaction(&tx).await {
            Ok(hash) => {
                step_send(phase, SendAction::Succeed);
                tracing::info!(tx_hash = %hash, to = to_address, "transaction submitted");
                self.store.set_tx_outcome(TxOutcome::Sent(hash.clone()));
                SendOutcome::Sent(hash)
            }
            Err(e) => {
                step_send(phase, SendAction::Fail);
                let message = e.provider_message();
                tracing::info!(error = %e, to = to_address, "transaction failed");
                self.store.set_tx_outcome(TxOutcome::Failed(message.clone()));
                SendOutcome::Failed(message)
            }
        }
    }

    /// User dismissed the error banner.
    pub fn acknowledge_error(&self) {
        self.store.clear_error();
    }

    pub fn clear_tx_result(&self) {
        self.store.set_tx_outcome(TxOutcome::Empty);
    }

    /// Unsubscribes and stops applying results. Safe to call repeatedly.
    pub fn teardown(&self) {
        if let Some(reconciler) = &self.reconciler {
            reconciler.teardown();
        }
        self.store.retire();
    }

    fn advance_connect(&self, action: ConnectAction) {
        let mut phase = lock_phase(&self.connect_phase);
        *phase = step_connect(*phase, action);
    }
}

fn lock_phase(phase: &Mutex<ConnectPhase>) -> MutexGuard<'_, ConnectPhase> {
    phase.lock().unwrap_or_else(PoisonError::into_inner)
}

fn step_connect(from: ConnectPhase, action: ConnectAction) -> ConnectPhase {
    match connect_transition(from, action) {
        Ok((to, t)) => {
            tracing::debug!(from = ?t.from, to = ?t.to, "connect transition");
            to
        }
        Err(e) => {
            tracing::warn!(error = %e, "connect state machine rejected step");
            from
        }
    }
}

fn step_send(from: SendPhase, action: SendAction) -> SendPhase {
    match send_transition(from, action) {
        Ok((to, t)) => {
            tracing::debug!(from = ?t.from, to = ?t.to, "send transition");
            to
        }
        Err(e) => {
            tracing::warn!(error = %e, "send state machine rejected step");
            from
        }
    }
}
