//! Owned container for the [`WalletSession`] snapshot.
//!
//! Every mutator publishes its field group with one `watch` send, so readers
//! only ever observe whole snapshots. After [`SessionStore::retire`] every
//! mutator except `finish_connect` is a no-op and reports `false`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::{
    Account, ChainId, ErrorOrigin, ProviderAvailability, SessionError, TxOutcome, WalletSession,
};

#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    session: watch::Sender<WalletSession>,
    live: AtomicBool,
}

impl SessionStore {
    pub fn new(availability: ProviderAvailability) -> Self {
        let (session, _) = watch::channel(WalletSession::new(availability));
        Self {
            inner: Arc::new(StoreInner {
                session,
                live: AtomicBool::new(true),
            }),
        }
    }

    pub fn snapshot(&self) -> WalletSession {
        self.inner.session.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletSession> {
        self.inner.session.subscribe()
    }

    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::SeqCst)
    }

    /// Returns `true` only for the call that actually retired the store.
    pub fn retire(&self) -> bool {
        self.inner.live.swap(false, Ordering::SeqCst)
    }

    fn update(&self, what: &'static str, f: impl FnOnce(&mut WalletSession) -> bool) -> bool {
        if !self.is_live() {
            tracing::debug!(update = what, "session retired; discarding update");
            return false;
        }
        self.inner.session.send_if_modified(f)
    }

    /// Atomic publish of the `{accounts, balance, chain_id}` group.
    pub fn publish_snapshot(
        &self,
        accounts: Vec<Account>,
        balance: String,
        chain_id: ChainId,
    ) -> bool {
        self.update("snapshot", move |s| {
            s.accounts = accounts;
            s.balance = Some(balance);
            s.chain_id = Some(chain_id);
            true
        })
    }

    /// Back to the disconnected defaults; a pending error is cleared too.
    pub fn reset_disconnected(&self) -> bool {
        self.update("disconnect", |s| {
            s.accounts.clear();
            s.balance = None;
            s.chain_id = None;
            s.error = None;
            true
        })
    }

    pub fn set_chain_id(&self, chain_id: ChainId) -> bool {
        self.update("chain", move |s| {
            if s.chain_id.as_ref() == Some(&chain_id) {
                return false;
            }
            s.chain_id = Some(chain_id);
            true
        })
    }

    /// Single-flight gate: flips `connecting` on and returns `true` only if it was off.
    pub fn try_begin_connect(&self) -> bool {
        self.update("connect_begin", |s| {
            if s.connecting {
                return false;
            }
            s.connecting = true;
            true
        })
    }

    /// Clears `connecting`. Unlike the other mutators this still applies after
    /// [`SessionStore::retire`], so a torn-down session never reads as connecting.
    pub fn finish_connect(&self) -> bool {
        self.inner
            .session
            .send_if_modified(|s| std::mem::replace(&mut s.connecting, false))
    }

    pub fn record_error(&self, origin: ErrorOrigin, message: impl Into<String>) -> bool {
        let error = SessionError {
            origin,
            message: message.into(),
        };
        self.update("error", move |s| {
            s.error = Some(error);
            true
        })
    }

    pub fn clear_error(&self) -> bool {
        self.update("error_clear", |s| s.error.take().is_some())
    }

    pub fn set_tx_outcome(&self, outcome: TxOutcome) -> bool {
        self.update("tx_outcome", move |s| {
            s.last_tx = outcome;
            true
        })
    }
}
