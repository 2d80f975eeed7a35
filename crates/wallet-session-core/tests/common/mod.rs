#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use wallet_session_core::{
    Account, EventChannel, EventListener, ListenerId, PortError, ProviderPort, SessionController,
};

pub const ONE_ETHER_HEX: &str = "0xDE0B6B3A7640000";

#[derive(Debug, Clone)]
pub enum Reply {
    Ok(Value),
    Rpc(i64, &'static str),
}

impl Reply {
    fn into_result(self) -> Result<Value, PortError> {
        match self {
            Self::Ok(v) => Ok(v),
            Self::Rpc(code, message) => Err(PortError::Rpc {
                code,
                message: message.to_owned(),
            }),
        }
    }
}

#[derive(Default)]
struct ScriptState {
    available: Option<bool>,
    defaults: HashMap<String, Reply>,
    queued: HashMap<String, VecDeque<Reply>>,
    gates: HashMap<String, Arc<Notify>>,
    calls: Vec<(String, Value)>,
    next_listener: u64,
    listeners: HashMap<ListenerId, (EventChannel, EventListener)>,
    // Every listener ever registered, used to simulate callbacks arriving late.
    history: Vec<(EventChannel, EventListener)>,
    removals: usize,
}

/// Wallet provider fake with scripted replies, per-method gates and manual event emission.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    inner: Arc<Mutex<ScriptState>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        let provider = Self::default();
        provider.set_available(Some(true));
        provider
    }

    /// Present provider with one account holding one ether on mainnet.
    pub fn funded(account: &str) -> Self {
        let provider = Self::new();
        provider.reply("eth_accounts", Reply::Ok(serde_json::json!([account])));
        provider.reply("eth_getBalance", Reply::Ok(serde_json::json!(ONE_ETHER_HEX)));
        provider.reply("eth_chainId", Reply::Ok(serde_json::json!("0x1")));
        provider
    }

    /// `None` makes the probe itself fail.
    pub fn set_available(&self, available: Option<bool>) {
        self.inner.lock().expect("script lock").available = available;
    }

    pub fn reply(&self, method: &str, reply: Reply) {
        self.inner
            .lock()
            .expect("script lock")
            .defaults
            .insert(method.to_owned(), reply);
    }

    pub fn reply_once(&self, method: &str, reply: Reply) {
        self.inner
            .lock()
            .expect("script lock")
            .queued
            .entry(method.to_owned())
            .or_default()
            .push_back(reply);
    }

    /// Holds every later `method` request until the returned notify fires once per request.
    pub fn gate(&self, method: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.inner
            .lock()
            .expect("script lock")
            .gates
            .insert(method.to_owned(), Arc::clone(&notify));
        notify
    }

    pub fn calls(&self, method: &str) -> Vec<Value> {
        self.inner
            .lock()
            .expect("script lock")
            .calls
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls(method).len()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().expect("script lock").listeners.len()
    }

    pub fn removals(&self) -> usize {
        self.inner.lock().expect("script lock").removals
    }

    pub fn emit(&self, channel: EventChannel, payload: Value) {
        let listeners: Vec<EventListener> = self
            .inner
            .lock()
            .expect("script lock")
            .listeners
            .values()
            .filter(|(c, _)| *c == channel)
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(payload.clone());
        }
    }

    /// Invokes listeners even if they were removed, like a provider that
    /// delivers a callback it had already queued.
    pub fn emit_stale(&self, channel: EventChannel, payload: Value) {
        let listeners: Vec<EventListener> = self
            .inner
            .lock()
            .expect("script lock")
            .history
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(payload.clone());
        }
    }

    pub async fn wait_for_calls(&self, method: &str, count: usize) {
        while self.call_count(method) < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl ProviderPort for ScriptedProvider {
    async fn is_available(&self) -> Result<bool, PortError> {
        self.inner
            .lock()
            .expect("script lock")
            .available
            .ok_or_else(|| PortError::Transport("probe exploded".to_owned()))
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let (reply, gate) = {
            let mut g = self.inner.lock().expect("script lock");
            g.calls.push((method.to_owned(), params));
            let queued = g.queued.get_mut(method).and_then(VecDeque::pop_front);
            let reply = queued
                .or_else(|| g.defaults.get(method).cloned())
                .unwrap_or(Reply::Rpc(-32601, "method not supported"));
            (reply, g.gates.get(method).cloned())
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        reply.into_result()
    }

    fn on(&self, channel: EventChannel, listener: EventListener) -> Result<ListenerId, PortError> {
        let mut g = self.inner.lock().expect("script lock");
        g.next_listener += 1;
        let id = ListenerId(g.next_listener);
        g.history.push((channel, Arc::clone(&listener)));
        g.listeners.insert(id, (channel, listener));
        Ok(id)
    }

    fn remove_listener(&self, _channel: EventChannel, id: ListenerId) -> Result<(), PortError> {
        let mut g = self.inner.lock().expect("script lock");
        if g.listeners.remove(&id).is_some() {
            g.removals += 1;
        }
        Ok(())
    }
}

pub async fn start(provider: &ScriptedProvider) -> SessionController<ScriptedProvider> {
    let controller = SessionController::start(Arc::new(provider.clone())).await;
    controller.flush().await;
    controller
}

pub fn account(raw: &str) -> Account {
    Account::from(raw)
}

pub const ALICE: &str = "0x1000000000000000000000000000000000000001";
pub const BOB: &str = "0x2000000000000000000000000000000000000002";
