//! Account addresses

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;

/// Number of raw bytes in an account address.
pub const ADDRESS_LEN: usize = 20;

/// A `0x`-prefixed, 20-byte account address.
///
/// The original spelling is kept for display (nodes often return
/// mixed-case checksummed addresses); equality ignores case.
#[derive(Debug, Clone, Eq)]
pub struct Address(String);

impl Address {
    pub fn parse(input: &str) -> Result<Self, SessionError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(SessionError::Validation("Address is required".to_string()));
        }

        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| {
                SessionError::Validation(format!("Address '{}' must start with 0x", s))
            })?;

        let mut bytes = [0u8; ADDRESS_LEN];
        hex::decode_to_slice(digits, &mut bytes).map_err(|e| {
            SessionError::Validation(format!("Invalid address '{}': {}", s, e))
        })?;

        Ok(Address(format!("0x{}", digits)))
    }

    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-case form used as a lookup key.
    pub fn to_lowercase(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// `0x1234…abcd` for narrow displays.
    pub fn short(&self) -> String {
        format!("{}…{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl std::hash::Hash for Address {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_lowercase().hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}
