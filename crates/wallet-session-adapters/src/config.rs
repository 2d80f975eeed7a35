use std::env;
use std::str::FromStr;

use thiserror::Error;

pub const ENV_RUNTIME_PROFILE: &str = "WALLET_SESSION_RUNTIME_PROFILE";
pub const ENV_EIP1193_PROXY_URL: &str = "WALLET_SESSION_EIP1193_PROXY_URL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "WALLET_SESSION_REQUEST_TIMEOUT_MS";
pub const ENV_EVENT_POLL_INTERVAL_MS: &str = "WALLET_SESSION_EVENT_POLL_INTERVAL_MS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeProfile {
    /// Falls back to the in-memory deterministic wallet when no provider is configured.
    #[default]
    Development,
    /// A real provider must be configured; otherwise the adapter reports itself absent.
    Production,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown runtime profile: {0}")]
pub struct UnknownProfile(String);

impl FromStr for RuntimeProfile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(UnknownProfile(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionAdapterConfig {
    pub runtime_profile: RuntimeProfile,
    pub eip1193_proxy_url: Option<String>,
    pub request_timeout_ms: u64,
    pub event_poll_interval_ms: u64,
}

impl Default for SessionAdapterConfig {
    fn default() -> Self {
        Self {
            runtime_profile: RuntimeProfile::Development,
            eip1193_proxy_url: None,
            request_timeout_ms: 15_000,
            event_poll_interval_ms: 1_000,
        }
    }
}

impl SessionAdapterConfig {
    /// Defaults overridden by `WALLET_SESSION_*` variables. Unparseable values are
    /// ignored with a warning.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(profile) = env_parse::<RuntimeProfile>(ENV_RUNTIME_PROFILE) {
            cfg.runtime_profile = profile;
        }
        if let Ok(url) = env::var(ENV_EIP1193_PROXY_URL) {
            let url = url.trim();
            if !url.is_empty() {
                cfg.eip1193_proxy_url = Some(url.to_owned());
            }
        }
        if let Some(ms) = env_parse::<u64>(ENV_REQUEST_TIMEOUT_MS) {
            cfg.request_timeout_ms = ms;
        }
        if let Some(ms) = env_parse::<u64>(ENV_EVENT_POLL_INTERVAL_MS) {
            cfg.event_poll_interval_ms = ms.max(1);
        }
        cfg
    }

    pub fn strict_runtime_required(&self) -> bool {
        self.runtime_profile == RuntimeProfile::Production
    }
}

fn env_parse<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "ignoring invalid config value");
            None
        }
    }
}
