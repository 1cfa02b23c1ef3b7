//! Exact conversions between display amounts and the ledger's smallest unit.
//!
//! Amounts never pass through floating point. A decimal string is split at
//! the point, the fractional digits are right-padded to the unit's scale and
//! the whole thing is parsed as one integer. Digits beyond the scale are only
//! accepted when they are all zero, so nothing is ever rounded away.

use std::fmt;

/// Amount in the smallest unit (wei).
pub type Wei = u128;

/// Decimal places of the whole-coin unit.
pub const ETHER_DECIMALS: u32 = 18;
/// Decimal places of the gas price unit.
pub const GWEI_DECIMALS: u32 = 9;

pub const WEI_PER_ETHER: Wei = 1_000_000_000_000_000_000;
pub const WEI_PER_GWEI: Wei = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    Empty,
    Negative,
    NotNumeric(String),
    TooPrecise { decimals: u32 },
    Overflow,
    BadQuantity(String),
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnitError::Empty => write!(f, "Amount is required"),
            UnitError::Negative => write!(f, "Amount cannot be negative"),
            UnitError::NotNumeric(s) => write!(f, "Amount '{}' is not a number", s),
            UnitError::TooPrecise { decimals } => write!(
                f,
                "Amount has more than {} decimal places and cannot be represented exactly",
                decimals
            ),
            UnitError::Overflow => write!(f, "Amount is too large"),
            UnitError::BadQuantity(s) => write!(f, "Invalid hex quantity '{}'", s),
        }
    }
}

impl std::error::Error for UnitError {}

/// Parse a non-negative decimal string into an integer scaled by `10^decimals`.
pub fn parse_units(input: &str, decimals: u32) -> Result<Wei, UnitError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(UnitError::Empty);
    }
    if s.starts_with('-') {
        return Err(UnitError::Negative);
    }

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };

    let digits_only = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty())
        || !digits_only(int_part)
        || !digits_only(frac_part)
    {
        return Err(UnitError::NotNumeric(s.to_string()));
    }

    let scale = decimals as usize;
    let frac = if frac_part.len() > scale {
        let (kept, dropped) = frac_part.split_at(scale);
        if dropped.bytes().any(|b| b != b'0') {
            return Err(UnitError::TooPrecise { decimals });
        }
        kept
    } else {
        frac_part
    };

    let whole: Wei = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| UnitError::Overflow)?
    };
    let frac_value: Wei = if frac.is_empty() {
        0
    } else {
        // Right-pad to the full scale: "5" at 18 decimals is 5 * 10^17.
        let padded = format!("{:0<width$}", frac, width = scale);
        padded.parse().map_err(|_| UnitError::Overflow)?
    };

    whole
        .checked_mul(10u128.pow(decimals))
        .and_then(|w| w.checked_add(frac_value))
        .ok_or(UnitError::Overflow)
}

/// Render a scaled integer as a decimal string with trailing zeros trimmed.
pub fn format_units(value: Wei, decimals: u32) -> String {
    let base = 10u128.pow(decimals);
    let whole = value / base;
    let frac = value % base;
    if frac == 0 {
        return whole.to_string();
    }

    let frac_str = format!("{:0>width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}

pub fn parse_ether(input: &str) -> Result<Wei, UnitError> {
    parse_units(input, ETHER_DECIMALS)
}

pub fn format_ether(wei: Wei) -> String {
    format_units(wei, ETHER_DECIMALS)
}

/// Gas price display, e.g. `1.5 Gwei`.
pub fn format_gwei(wei: Wei) -> String {
    format!("{} Gwei", format_units(wei, GWEI_DECIMALS))
}

/// Decode a `0x`-prefixed hex quantity.
pub fn parse_quantity(input: &str) -> Result<Wei, UnitError> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .ok_or_else(|| UnitError::BadQuantity(input.to_string()))?;
    if digits.is_empty() {
        return Err(UnitError::BadQuantity(input.to_string()));
    }
    Wei::from_str_radix(digits, 16).map_err(|_| UnitError::BadQuantity(input.to_string()))
}

pub fn parse_quantity_u64(input: &str) -> Result<u64, UnitError> {
    let value = parse_quantity(input)?;
    u64::try_from(value).map_err(|_| UnitError::Overflow)
}

/// Encode as a minimal `0x`-prefixed hex quantity.
pub fn to_quantity(value: impl Into<Wei>) -> String {
    format!("{:#x}", value.into())
}
