use std::fmt;

use serde::{Deserialize, Serialize};

use crate::units::{chain_id_to_decimal, UnitsError};

/// Provider-issued account identifier, kept exactly as the provider reported it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Account(String);

impl Account {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Account {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex network identifier as reported by the provider (`"0x1"`, `"0x89"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Numeric chain ids are normalized to lowercase `0x` hex.
    pub fn from_number(n: u64) -> Self {
        Self(format!("{n:#x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_decimal(&self) -> Result<u64, UnitsError> {
        chain_id_to_decimal(&self.0)
    }
}

impl From<&str> for ChainId {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderAvailability {
    #[default]
    Unknown,
    Absent,
    Present,
}

/// Result of the most recent send. `Display` renders the single-string form a
/// shell shows: empty, the tx hash, or the provider's error message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum TxOutcome {
    #[default]
    Empty,
    Sent(TxHash),
    Failed(String),
}

impl TxOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for TxOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Sent(hash) => write!(f, "{hash}"),
            Self::Failed(message) => f.write_str(message),
        }
    }
}

/// Which request produced a session error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorOrigin {
    AccountQuery,
    Subscribe,
    Connect,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionError {
    pub origin: ErrorOrigin,
    pub message: String,
}

/// Snapshot of the wallet as the application currently sees it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WalletSession {
    pub availability: ProviderAvailability,
    pub accounts: Vec<Account>,
    pub balance: Option<String>,
    pub chain_id: Option<ChainId>,
    pub connecting: bool,
    pub last_tx: TxOutcome,
    pub error: Option<SessionError>,
}

impl WalletSession {
    pub fn new(availability: ProviderAvailability) -> Self {
        Self {
            availability,
            ..Self::default()
        }
    }

    pub fn primary_account(&self) -> Option<&Account> {
        self.accounts.first()
    }

    pub fn is_connected(&self) -> bool {
        !self.accounts.is_empty()
    }

    pub fn chain_id_decimal(&self) -> Option<u64> {
        self.chain_id.as_ref().and_then(|c| c.to_decimal().ok())
    }

    pub fn can_connect(&self) -> bool {
        self.availability == ProviderAvailability::Present
            && self.accounts.is_empty()
            && !self.connecting
    }

    pub fn can_send(&self) -> bool {
        self.is_connected() && self.last_tx.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventChannel {
    AccountsChanged,
    ChainChanged,
}

impl EventChannel {
    pub fn event_name(self) -> &'static str {
        match self {
            Self::AccountsChanged => "accountsChanged",
            Self::ChainChanged => "chainChanged",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

/// Provider update after the payload has been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    AccountsChanged(Vec<Account>),
    ChainChanged(ChainId),
}

/// Fixed transfer policy for the send intent. Values are hex quantities passed
/// through to the provider untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxPolicy {
    pub value: &'static str,
    pub gas_limit: &'static str,
    pub max_priority_fee_per_gas: &'static str,
    pub max_fee_per_gas: &'static str,
}

impl TxPolicy {
    /// 0.001 ether, 21000 gas, 1 gwei tip, 2 gwei cap.
    pub const DEFAULT: Self = Self {
        value: "0x38D7EA4C68000",
        gas_limit: "0x5208",
        max_priority_fee_per_gas: "0x3b9aca00",
        max_fee_per_gas: "0x77359400",
    };
}

impl Default for TxPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Account,
    pub to: String,
    pub value: String,
    pub gas_limit: String,
    pub max_priority_fee_per_gas: String,
    pub max_fee_per_gas: String,
}

impl TransactionRequest {
    pub fn transfer(from: Account, to: impl Into<String>, policy: &TxPolicy) -> Self {
        Self {
            from,
            to: to.into(),
            value: policy.value.to_owned(),
            gas_limit: policy.gas_limit.to_owned(),
            max_priority_fee_per_gas: policy.max_priority_fee_per_gas.to_owned(),
            max_fee_per_gas: policy.max_fee_per_gas.to_owned(),
        }
    }
}
