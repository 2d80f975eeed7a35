use alloy::primitives::U256;
use thiserror::Error;

/// Base units (wei) per display unit (ether) is `10^ETHER_DECIMALS`.
pub const ETHER_DECIMALS: usize = 18;

const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitsError {
    #[error("empty quantity")]
    Empty,
    #[error("invalid hex quantity {raw:?}: {reason}")]
    InvalidHex { raw: String, reason: String },
    #[error("invalid chain id {raw:?}: {reason}")]
    InvalidChainId { raw: String, reason: String },
}

fn strip_hex_prefix(raw: &str) -> &str {
    raw.strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw)
}

/// Parses a provider hex quantity (`0x`-prefixed or bare) into a base-unit integer.
pub fn parse_quantity(raw: &str) -> Result<U256, UnitsError> {
    let digits = strip_hex_prefix(raw.trim());
    if digits.is_empty() {
        return Err(UnitsError::Empty);
    }
    U256::from_str_radix(digits, 16).map_err(|e| UnitsError::InvalidHex {
        raw: raw.to_owned(),
        reason: e.to_string(),
    })
}

/// Renders a hex wei balance as an ether decimal string with trailing zeros
/// removed: `0x0` -> `"0"`, `0xde0b6b3a7640000` -> `"1"`, `0x38d7ea4c68000` -> `"0.001"`.
pub fn format_balance(raw: &str) -> Result<String, UnitsError> {
    let wei = parse_quantity(raw)?;
    let unit = U256::from(WEI_PER_ETHER);
    let whole = wei / unit;
    let fraction = wei % unit;
    if fraction.is_zero() {
        return Ok(whole.to_string());
    }
    let padded = format!("{:0>width$}", fraction.to_string(), width = ETHER_DECIMALS);
    Ok(format!("{whole}.{}", padded.trim_end_matches('0')))
}

/// Hex chain ids (`0x89`) are read as base 16, anything else as base 10.
pub fn chain_id_to_decimal(raw: &str) -> Result<u64, UnitsError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UnitsError::Empty);
    }
    let parsed = if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        u64::from_str_radix(strip_hex_prefix(trimmed), 16)
    } else {
        trimmed.parse()
    };
    parsed.map_err(|e| UnitsError::InvalidChainId {
        raw: raw.to_owned(),
        reason: e.to_string(),
    })
}
