use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{Account, ChainId, EventChannel, ListenerId, TransactionRequest, TxHash};
use crate::units::{chain_id_to_decimal, format_balance};

#[derive(Debug, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("policy error: {0}")]
    Policy(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("provider error {code}: {message}")]
    Rpc { code: i64, message: String },
}

impl PortError {
    /// Text shown to the user. Provider rejections keep the provider's own wording.
    pub fn provider_message(&self) -> String {
        match self {
            Self::Rpc { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Callback invoked with the raw payload of a provider event.
pub type EventListener = Arc<dyn Fn(Value) + Send + Sync>;

/// EIP-1193 style wallet provider.
#[async_trait]
pub trait ProviderPort: Send + Sync {
    /// Non-prompting check for an injected, compatible provider.
    async fn is_available(&self) -> Result<bool, PortError>;

    async fn request(&self, method: &str, params: Value) -> Result<Value, PortError>;

    fn on(&self, channel: EventChannel, listener: EventListener) -> Result<ListenerId, PortError>;

    /// Removing an unknown or already removed listener is not an error.
    fn remove_listener(&self, channel: EventChannel, id: ListenerId) -> Result<(), PortError>;

    /// `eth_accounts`: never prompts.
    async fn accounts(&self) -> Result<Vec<Account>, PortError> {
        let result = self.request("eth_accounts", serde_json::json!([])).await?;
        decode_accounts(&result)
    }

    /// `eth_requestAccounts`: may prompt the user for authorization.
    async fn request_accounts(&self) -> Result<Vec<Account>, PortError> {
        let result = self
            .request("eth_requestAccounts", serde_json::json!([]))
            .await?;
        decode_accounts(&result)
    }

    /// `eth_getBalance` at `latest`, formatted as an ether decimal string.
    async fn balance_of(&self, account: &Account) -> Result<String, PortError> {
        let result = self
            .request(
                "eth_getBalance",
                serde_json::json!([account.as_str(), "latest"]),
            )
            .await?;
        let raw = result
            .as_str()
            .ok_or_else(|| PortError::Validation("eth_getBalance must return hex string".to_owned()))?;
        format_balance(raw).map_err(|e| PortError::Validation(e.to_string()))
    }

    async fn chain_id(&self) -> Result<ChainId, PortError> {
        let result = self.request("eth_chainId", serde_json::json!([])).await?;
        decode_chain_id(&result)
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, PortError> {
        let payload = serde_json::to_value(tx)
            .map_err(|e| PortError::Validation(format!("tx payload serialization failed: {e}")))?;
        let result = self
            .request("eth_sendTransaction", serde_json::json!([payload]))
            .await?;
        let hash = result.as_str().ok_or_else(|| {
            PortError::Validation("eth_sendTransaction must return tx hash".to_owned())
        })?;
        Ok(TxHash::new(hash))
    }
}

pub fn decode_accounts(value: &Value) -> Result<Vec<Account>, PortError> {
    let arr = value
        .as_array()
        .ok_or_else(|| PortError::Validation("accounts payload must be an array".to_owned()))?;
    arr.iter()
        .map(|item| {
            item.as_str()
                .map(Account::from)
                .ok_or_else(|| PortError::Validation("account entry must be a string".to_owned()))
        })
        .collect()
}

pub fn decode_chain_id(value: &Value) -> Result<ChainId, PortError> {
    if let Some(n) = value.as_u64() {
        return Ok(ChainId::from_number(n));
    }
    let raw = value
        .as_str()
        .ok_or_else(|| PortError::Validation("chain id must be string or number".to_owned()))?;
    if !(raw.starts_with("0x") || raw.starts_with("0X")) {
        return Err(PortError::Validation(format!(
            "chain id must be 0x-prefixed hex, got {raw:?}"
        )));
    }
    chain_id_to_decimal(raw).map_err(|e| PortError::Validation(e.to_string()))?;
    Ok(ChainId::new(raw))
}
