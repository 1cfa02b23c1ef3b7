//! Value-transfer requests
//!
//! A [`TransferRequest`] holds what the caller typed. [`TransferRequest::validate`]
//! turns it into a [`ValidTransfer`] or a validation error without touching
//! the network, so a bad form never costs a node round-trip.

use serde::Serialize;
use serde_json::{json, Value};

use crate::address::Address;
use crate::error::SessionError;
use crate::units::{format_ether, parse_ether, to_quantity, Wei};

/// Gas attached to every plain value transfer.
pub const TRANSFER_GAS: u64 = 21_000;

/// Transaction identifier returned by the node.
pub type TxHash = String;

/// Outcome of the most recent submission.
pub type TransferResult = Result<TxHash, SessionError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    from: String,
    to: String,
    amount: String,
    gas: u64,
}

impl TransferRequest {
    /// `amount` is in whole coins, e.g. `"0.25"`.
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount: amount.into(),
            gas: TRANSFER_GAS,
        }
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn gas(&self) -> u64 {
        self.gas
    }

    pub fn validate(&self) -> Result<ValidTransfer, SessionError> {
        if self.from.trim().is_empty() {
            return Err(SessionError::Validation("Sender account is required".to_string()));
        }
        if self.to.trim().is_empty() {
            return Err(SessionError::Validation("Recipient account is required".to_string()));
        }
        if self.amount.trim().is_empty() {
            return Err(SessionError::Validation("Amount is required".to_string()));
        }

        let from = Address::parse(&self.from)?;
        let to = Address::parse(&self.to)?;
        let value = parse_ether(&self.amount).map_err(|e| SessionError::Validation(e.to_string()))?;

        Ok(ValidTransfer {
            from,
            to,
            value,
            gas: self.gas,
        })
    }
}

/// A request that passed local checks, amount already in wei.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidTransfer {
    pub from: Address,
    pub to: Address,
    pub value: Wei,
    pub gas: u64,
}

impl ValidTransfer {
    /// Parameters for `eth_sendTransaction`.
    pub fn to_params(&self) -> Value {
        json!([{
            "from": self.from,
            "to": self.to,
            "value": to_quantity(self.value),
            "gas": to_quantity(self.gas),
        }])
    }

    pub fn describe(&self) -> String {
        format!("{} ETH {} -> {}", format_ether(self.value), self.from.short(), self.to.short())
    }
}
