//! Latest-block summaries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::units::{format_gwei, parse_quantity, parse_quantity_u64, UnitError, Wei};

/// Block header fields as returned by `eth_getBlockByNumber(_, false)`.
///
/// Only what the summary needs is decoded; transactions stay opaque.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcBlock {
    pub number: Option<String>,
    pub hash: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub transactions: Vec<Value>,
}

/// Read-only snapshot of a block plus the gas price seen right after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
    pub height: u64,
    pub hash: String,
    pub timestamp: u64,
    pub timestamp_display: String,
    pub gas_price: Wei,
    pub gas_price_display: String,
    pub transaction_count: usize,
}

impl BlockSummary {
    /// `height` is the number we asked for; the block's own number wins if present.
    pub fn from_rpc(height: u64, block: RpcBlock, gas_price: Wei) -> Result<Self, UnitError> {
        let height = match block.number.as_deref() {
            Some(n) => parse_quantity_u64(n)?,
            None => height,
        };
        let timestamp = parse_quantity_u64(&block.timestamp)?;

        Ok(Self {
            height,
            // Pending blocks carry no hash yet.
            hash: block.hash.unwrap_or_default(),
            timestamp,
            timestamp_display: format_timestamp(timestamp),
            gas_price,
            gas_price_display: format_gwei(gas_price),
            transaction_count: block.transactions.len(),
        })
    }
}

/// Seconds since the epoch rendered as `YYYY-MM-DD HH:MM:SS UTC`.
pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("{}s after epoch", secs))
}

/// Parse a hex gas price into wei.
pub fn parse_gas_price(quantity: &str) -> Result<Wei, UnitError> {
    parse_quantity(quantity)
}
