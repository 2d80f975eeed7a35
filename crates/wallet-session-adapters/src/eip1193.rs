use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use alloy::primitives::{keccak256, U256};
use async_trait::async_trait;
use serde_json::Value;

use wallet_session_core::{
    parse_quantity, EventChannel, EventListener, ListenerId, PortError, ProviderPort,
};

use crate::SessionAdapterConfig;

const DEFAULT_ACCOUNT: &str = "0x1000000000000000000000000000000000000001";
const ONE_ETHER_WEI: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone)]
pub struct Eip1193Adapter {
    mode: ProviderMode,
    state: Arc<Mutex<ProviderState>>,
}

#[derive(Debug, Clone)]
enum ProviderMode {
    Disabled(String),
    Deterministic,
    Proxy(ProxyRuntime),
}

#[derive(Debug, Clone)]
struct ProxyRuntime {
    base_url: String,
    client: reqwest::Client,
    next_id: Arc<AtomicU64>,
}

#[derive(Debug, Default)]
struct ProviderState {
    wallet: DeterministicWallet,
    fail_next: HashMap<String, (i64, String)>,
    listeners: ListenerRegistry,
    // Last (accounts, chain id) seen by `poll_events` against the proxy.
    polled: Option<(Vec<String>, String)>,
}

/// In-memory wallet served in deterministic mode. Accounts stay hidden from
/// `eth_accounts` until `eth_requestAccounts` authorizes them.
#[derive(Debug)]
struct DeterministicWallet {
    authorized: bool,
    accounts: Vec<String>,
    balances: HashMap<String, U256>,
    chain_id: u64,
    sent: Vec<Value>,
}

impl Default for DeterministicWallet {
    fn default() -> Self {
        let mut balances = HashMap::new();
        balances.insert(DEFAULT_ACCOUNT.to_ascii_lowercase(), U256::from(ONE_ETHER_WEI));
        Self {
            authorized: false,
            accounts: vec![DEFAULT_ACCOUNT.to_owned()],
            balances,
            chain_id: 1,
            sent: Vec::new(),
        }
    }
}

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    entries: HashMap<ListenerId, (EventChannel, EventListener)>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("next_id", &self.next_id)
            .field("registered", &self.entries.len())
            .finish()
    }
}

impl ListenerRegistry {
    fn for_channel(&self, channel: EventChannel) -> Vec<EventListener> {
        self.entries
            .values()
            .filter(|(c, _)| *c == channel)
            .map(|(_, l)| Arc::clone(l))
            .collect()
    }
}

impl Default for Eip1193Adapter {
    fn default() -> Self {
        Self::with_config(SessionAdapterConfig::from_env())
    }
}

impl Eip1193Adapter {
    pub fn with_config(config: SessionAdapterConfig) -> Self {
        let mode = if let Some(ref base_url) = config.eip1193_proxy_url {
            let timeout = Duration::from_millis(config.request_timeout_ms);
            match reqwest::Client::builder().timeout(timeout).build() {
                Ok(client) => ProviderMode::Proxy(ProxyRuntime {
                    base_url: base_url.clone(),
                    client,
                    next_id: Arc::new(AtomicU64::new(1)),
                }),
                Err(e) => {
                    if config.strict_runtime_required() {
                        ProviderMode::Disabled(format!(
                            "failed to initialize EIP-1193 proxy client in production profile: {e}"
                        ))
                    } else {
                        tracing::warn!(error = %e, "proxy client init failed; using deterministic wallet");
                        ProviderMode::Deterministic
                    }
                }
            }
        } else if config.strict_runtime_required() {
            ProviderMode::Disabled(
                "EIP-1193 proxy URL not configured in production runtime profile".to_owned(),
            )
        } else {
            ProviderMode::Deterministic
        };

        Self {
            mode,
            state: Arc::new(Mutex::new(ProviderState::default())),
        }
    }

    pub fn deterministic() -> Self {
        Self::with_config(SessionAdapterConfig::default())
    }

    pub fn mode_name(&self) -> &'static str {
        match self.mode {
            ProviderMode::Disabled(_) => "disabled",
            ProviderMode::Deterministic => "deterministic",
            ProviderMode::Proxy(_) => "proxy",
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ProviderState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("provider lock poisoned: {e}")))
    }

    fn check_mode(&self) -> Result<(), PortError> {
        if let ProviderMode::Disabled(reason) = &self.mode {
            return Err(PortError::Policy(reason.clone()));
        }
        Ok(())
    }

    fn emit(&self, channel: EventChannel, payload: Value) -> Result<(), PortError> {
        let listeners = self.lock()?.listeners.for_channel(channel);
        tracing::debug!(
            event = channel.event_name(),
            listeners = listeners.len(),
            "emitting provider event"
        );
        for listener in listeners {
            listener(payload.clone());
        }
        Ok(())
    }

    /// Replaces the wallet's account set and notifies listeners, as a wallet does
    /// when the user switches or revokes accounts.
    pub fn debug_inject_accounts_changed(&self, accounts: Vec<String>) -> Result<(), PortError> {
        {
            let mut g = self.lock()?;
            g.wallet.authorized = !accounts.is_empty();
            g.wallet.accounts = accounts.clone();
        }
        self.emit(EventChannel::AccountsChanged, serde_json::json!(accounts))
    }

    pub fn debug_inject_chain_changed(&self, chain_id: u64) -> Result<(), PortError> {
        self.lock()?.wallet.chain_id = chain_id;
        self.emit(EventChannel::ChainChanged, serde_json::json!(format!("{chain_id:#x}")))
    }

    pub fn debug_set_balance(&self, account: &str, wei: U256) -> Result<(), PortError> {
        self.lock()?
            .wallet
            .balances
            .insert(account.to_ascii_lowercase(), wei);
        Ok(())
    }

    /// The next `method` request is rejected with this provider error.
    pub fn debug_fail_next(&self, method: &str, code: i64, message: &str) -> Result<(), PortError> {
        self.lock()?
            .fail_next
            .insert(method.to_owned(), (code, message.to_owned()));
        Ok(())
    }

    pub fn debug_sent_transactions(&self) -> Result<Vec<Value>, PortError> {
        Ok(self.lock()?.wallet.sent.clone())
    }

    /// Polls a proxied wallet for account/chain drift and emits the matching
    /// events. The first poll only records a baseline. Returns the number of
    /// events emitted.
    pub async fn poll_events(&self) -> Result<usize, PortError> {
        self.check_mode()?;
        if !matches!(self.mode, ProviderMode::Proxy(_)) {
            return Ok(0);
        }
        let accounts = self.proxy_call("eth_accounts", serde_json::json!([])).await?;
        let accounts: Vec<String> = serde_json::from_value(accounts)
            .map_err(|e| PortError::Validation(format!("eth_accounts: {e}")))?;
        let chain = self.proxy_call("eth_chainId", serde_json::json!([])).await?;
        let chain = match chain {
            Value::String(s) => s,
            Value::Number(n) => n
                .as_u64()
                .map(|n| format!("{n:#x}"))
                .ok_or_else(|| PortError::Validation("eth_chainId: invalid number".to_owned()))?,
            other => {
                return Err(PortError::Validation(format!(
                    "eth_chainId: unexpected result {other}"
                )))
            }
        };

        let previous = self.lock()?.polled.replace((accounts.clone(), chain.clone()));
        let Some((prev_accounts, prev_chain)) = previous else {
            return Ok(0);
        };
        let mut emitted = 0;
        if prev_accounts != accounts {
            self.emit(EventChannel::AccountsChanged, serde_json::json!(accounts))?;
            emitted += 1;
        }
        if prev_chain != chain {
            self.emit(EventChannel::ChainChanged, serde_json::json!(chain))?;
            emitted += 1;
        }
        Ok(emitted)
    }

    async fn proxy_call(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let proxy = match &self.mode {
            ProviderMode::Proxy(proxy) => proxy,
            ProviderMode::Disabled(reason) => return Err(PortError::Policy(reason.clone())),
            ProviderMode::Deterministic => {
                return Err(PortError::NotImplemented("eip1193 proxy runtime not enabled"))
            }
        };

        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": proxy.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let response = proxy
            .client
            .post(&proxy.base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy request failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy json decode failed: {e}")))?;
        if let Some(err) = body.get("error") {
            return Err(rpc_error(err));
        }
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "eip1193 proxy status {status}: {body}"
            )));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| PortError::Transport("eip1193 proxy missing result".to_owned()))
    }

    fn deterministic_call(&self, method: &str, params: &Value) -> Result<Value, PortError> {
        let mut g = self.lock()?;
        if let Some((code, message)) = g.fail_next.remove(method) {
            return Err(PortError::Rpc { code, message });
        }
        let wallet = &mut g.wallet;
        match method {
            "eth_accounts" => Ok(if wallet.authorized {
                serde_json::json!(wallet.accounts)
            } else {
                serde_json::json!([])
            }),
            "eth_requestAccounts" => {
                let newly_authorized = !wallet.authorized;
                wallet.authorized = true;
                let accounts = serde_json::json!(wallet.accounts);
                drop(g);
                if newly_authorized {
                    self.emit(EventChannel::AccountsChanged, accounts.clone())?;
                }
                Ok(accounts)
            }
            "eth_chainId" => Ok(serde_json::json!(format!("{:#x}", wallet.chain_id))),
            "eth_getBalance" => {
                let account = params
                    .get(0)
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid_params("eth_getBalance expects [address, block]"))?;
                let wei = wallet
                    .balances
                    .get(&account.to_ascii_lowercase())
                    .copied()
                    .unwrap_or(U256::ZERO);
                Ok(serde_json::json!(format!("0x{wei:x}")))
            }
            "eth_sendTransaction" => {
                let tx = params
                    .get(0)
                    .ok_or_else(|| invalid_params("eth_sendTransaction expects [tx]"))?;
                let from = tx
                    .get("from")
                    .and_then(Value::as_str)
                    .map(str::to_ascii_lowercase)
                    .ok_or_else(|| invalid_params("transaction missing from"))?;
                if !wallet.authorized
                    || !wallet.accounts.iter().any(|a| a.to_ascii_lowercase() == from)
                {
                    return Err(PortError::Rpc {
                        code: 4100,
                        message: "The requested account has not been authorized by the user."
                            .to_owned(),
                    });
                }
                let value = quantity_field(tx, "value")?;
                let gas = quantity_field(tx, "gasLimit")?;
                let max_fee = quantity_field(tx, "maxFeePerGas")?;
                let cost = value.saturating_add(gas.saturating_mul(max_fee));
                let balance = wallet.balances.entry(from).or_insert(U256::ZERO);
                if *balance < cost {
                    return Err(PortError::Rpc {
                        code: -32000,
                        message: "insufficient funds".to_owned(),
                    });
                }
                *balance -= cost;
                wallet.sent.push(tx.clone());
                let canonical = serde_json::to_vec(tx).map_err(|e| {
                    PortError::Validation(format!("tx payload serialization failed: {e}"))
                })?;
                Ok(serde_json::json!(keccak256(canonical).to_string()))
            }
            other => Err(PortError::Rpc {
                code: -32601,
                message: format!("method not supported: {other}"),
            }),
        }
    }
}

#[async_trait]
impl ProviderPort for Eip1193Adapter {
    async fn is_available(&self) -> Result<bool, PortError> {
        match &self.mode {
            ProviderMode::Disabled(reason) => {
                tracing::debug!(reason = %reason, "provider disabled");
                Ok(false)
            }
            ProviderMode::Deterministic => Ok(true),
            // Any answer to a read-only call means something is listening.
            ProviderMode::Proxy(_) => self
                .proxy_call("eth_chainId", serde_json::json!([]))
                .await
                .map(|_| true),
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, PortError> {
        self.check_mode()?;
        tracing::debug!(method, "provider request");
        match self.mode {
            ProviderMode::Proxy(_) => self.proxy_call(method, params).await,
            _ => self.deterministic_call(method, &params),
        }
    }

    fn on(&self, channel: EventChannel, listener: EventListener) -> Result<ListenerId, PortError> {
        self.check_mode()?;
        let mut g = self.lock()?;
        g.listeners.next_id += 1;
        let id = ListenerId(g.listeners.next_id);
        g.listeners.entries.insert(id, (channel, listener));
        Ok(id)
    }

    fn remove_listener(&self, channel: EventChannel, id: ListenerId) -> Result<(), PortError> {
        let mut g = self.lock()?;
        if matches!(g.listeners.entries.get(&id), Some((c, _)) if *c == channel) {
            g.listeners.entries.remove(&id);
        }
        Ok(())
    }
}

fn rpc_error(err: &Value) -> PortError {
    let code = err.get("code").and_then(Value::as_i64).unwrap_or(-32603);
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| err.to_string());
    PortError::Rpc { code, message }
}

fn invalid_params(message: &str) -> PortError {
    PortError::Rpc {
        code: -32602,
        message: message.to_owned(),
    }
}

fn quantity_field(tx: &Value, key: &str) -> Result<U256, PortError> {
    let raw = tx
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid_params(&format!("transaction missing {key}")))?;
    parse_quantity(raw).map_err(|e| invalid_params(&format!("transaction {key}: {e}")))
}
