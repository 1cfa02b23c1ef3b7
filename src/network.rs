//! Network identification

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Well-known chain ids and their display labels.
static CHAIN_LABELS: Lazy<HashMap<u64, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (1, "Ethereum Mainnet"),
        (5, "Goerli Testnet"),
        (1337, "Local Dev Chain"),
        (17000, "Holesky Testnet"),
        (31337, "Anvil Local Chain"),
        (11155111, "Sepolia Testnet"),
    ])
});

/// Human label for a chain id; unknown ids render as `Network {id}`.
pub fn chain_label(chain_id: u64) -> String {
    CHAIN_LABELS
        .get(&chain_id)
        .map(|label| label.to_string())
        .unwrap_or_else(|| format!("Network {}", chain_id))
}

/// What the node reported about itself at one point in time.
///
/// Always built whole from one `describe_network` round; never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSnapshot {
    pub chain_id: u64,
    pub label: String,
    pub block_height: u64,
}

impl NetworkSnapshot {
    pub fn new(chain_id: u64, block_height: u64) -> Self {
        Self {
            chain_id,
            label: chain_label(chain_id),
            block_height,
        }
    }
}
