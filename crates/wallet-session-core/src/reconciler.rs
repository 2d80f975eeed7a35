//! Keeps the session in line with provider-pushed account and chain events.
//!
//! Provider callbacks and locally produced account sets (silent query, connect)
//! all land in one channel drained by a single task, so updates apply in
//! arrival order and at most one refresh is in flight at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::domain::{Account, ErrorOrigin, EventChannel, ListenerId, SessionEvent};
use crate::ports::{decode_accounts, decode_chain_id, EventListener, PortError, ProviderPort};
use crate::refresher::BalanceRefresher;
use crate::store::SessionStore;

#[derive(Debug)]
enum Inbound {
    Provider {
        channel: EventChannel,
        payload: Value,
    },
    Local(SessionEvent),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Validates a raw provider payload for the channel it arrived on.
pub fn decode_event(channel: EventChannel, payload: &Value) -> Result<SessionEvent, PortError> {
    match channel {
        EventChannel::AccountsChanged => decode_accounts(payload).map(SessionEvent::AccountsChanged),
        EventChannel::ChainChanged => decode_chain_id(payload).map(SessionEvent::ChainChanged),
    }
}

pub struct EventReconciler<P: ProviderPort + ?Sized + 'static> {
    provider: Arc<P>,
    store: SessionStore,
    inbox: mpsc::UnboundedSender<Inbound>,
    listeners: Mutex<Vec<(EventChannel, ListenerId)>>,
    torn_down: AtomicBool,
}

impl<P: ProviderPort + ?Sized + 'static> EventReconciler<P> {
    /// Subscribes to both provider channels, starts the consumer task and feeds it
    /// the result of a silent `eth_accounts` query.
    pub async fn start(provider: Arc<P>, store: SessionStore) -> Self {
        let (inbox, rx) = mpsc::unbounded_channel();
        let refresher = BalanceRefresher::new(Arc::clone(&provider), store.clone());
        tokio::spawn(consume(rx, store.clone(), refresher));

        let reconciler = Self {
            provider,
            store,
            inbox,
            listeners: Mutex::new(Vec::new()),
            torn_down: AtomicBool::new(false),
        };
        reconciler.subscribe(EventChannel::AccountsChanged);
        reconciler.subscribe(EventChannel::ChainChanged);

        match reconciler.provider.accounts().await {
            Ok(accounts) => reconciler.enqueue(SessionEvent::AccountsChanged(accounts)),
            Err(e) => {
                tracing::warn!(error = %e, "initial account query failed");
                reconciler
                    .store
                    .record_error(ErrorOrigin::AccountQuery, e.provider_message());
            }
        }
        reconciler
    }

    fn subscribe(&self, channel: EventChannel) {
        let inbox = self.inbox.clone();
        let listener: EventListener = Arc::new(move |payload: Value| {
            if inbox.send(Inbound::Provider { channel, payload }).is_err() {
                tracing::debug!(
                    event = channel.event_name(),
                    "reconciler stopped; dropping provider event"
                );
            }
        });
        match self.provider.on(channel, listener) {
            Ok(id) => {
                tracing::info!(event = channel.event_name(), listener = id.0, "subscribed");
                if let Ok(mut g) = self.listeners.lock() {
                    g.push((channel, id));
                }
            }
            Err(e) => {
                tracing::warn!(event = channel.event_name(), error = %e, "subscribe failed");
                self.store
                    .record_error(ErrorOrigin::Subscribe, e.provider_message());
            }
        }
    }

    /// Queues an update behind every event already received.
    pub fn enqueue(&self, event: SessionEvent) {
        if self.inbox.send(Inbound::Local(event)).is_err() {
            tracing::debug!("reconciler stopped; dropping local event");
        }
    }

    /// Resolves once everything queued before this call has been applied.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.inbox.send(Inbound::Flush(done)).is_err() {
            return;
        }
        let _ = wait.await;
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Removes both listeners and stops the consumer. Only the first call does anything.
    pub fn teardown(&self) -> bool {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.store.retire();

        let registered = match self.listeners.lock() {
            Ok(mut g) => std::mem::take(&mut *g),
            Err(e) => std::mem::take(&mut *e.into_inner()),
        };
        for (channel, id) in registered {
            if let Err(e) = self.provider.remove_listener(channel, id) {
                tracing::warn!(event = channel.event_name(), error = %e, "unsubscribe failed");
            }
        }
        let _ = self.inbox.send(Inbound::Shutdown);
        tracing::info!("event reconciler torn down");
        true
    }
}

impl<P: ProviderPort + ?Sized + 'static> Drop for EventReconciler<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn consume<P: ProviderPort + ?Sized>(
    mut rx: mpsc::UnboundedReceiver<Inbound>,
    store: SessionStore,
    refresher: BalanceRefresher<P>,
) {
    // Account set of the last refresh that reached the store.
    let mut last_refreshed: Option<Vec<Account>> = None;

    while let Some(msg) = rx.recv().await {
        let event = match msg {
            Inbound::Shutdown => break,
            Inbound::Flush(done) => {
                let _ = done.send(());
                continue;
            }
            _ if !store.is_live() => {
                tracing::debug!("session retired; discarding queued event");
                continue;
            }
            Inbound::Local(event) => event,
            Inbound::Provider { channel, payload } => match decode_event(channel, &payload) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(
                        event = channel.event_name(),
                        %payload,
                        error = %e,
                        "malformed provider event dropped"
                    );
                    continue;
                }
            },
        };

        match event {
            SessionEvent::AccountsChanged(accounts) if accounts.is_empty() => {
                tracing::info!("provider reports no accounts; resetting session");
                last_refreshed = None;
                store.reset_disconnected();
            }
            SessionEvent::AccountsChanged(accounts) => {
                if last_refreshed.as_ref() == Some(&accounts)
                    && store.snapshot().accounts == accounts
                {
                    tracing::debug!("account set unchanged since last refresh; skipping");
                    continue;
                }
                last_refreshed = match refresher.refresh(accounts.clone()).await {
                    Ok(true) => Some(accounts),
                    Ok(false) | Err(_) => None,
                };
            }
            SessionEvent::ChainChanged(chain_id) => {
                tracing::debug!(chain_id = %chain_id, "chain changed");
                store.set_chain_id(chain_id);
            }
        }
    }
    tracing::debug!("reconciler consumer stopped");
}
