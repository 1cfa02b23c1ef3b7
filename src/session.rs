//! Ledger session: one endpoint, five operations
//!
//! A [`LedgerSession`] records an endpoint and an HTTP transport and nothing
//! else. Every operation is an independent request/response round-trip (or a
//! short fixed sequence of them), so a session can be cloned into several
//! tasks and used concurrently; nothing inside it is written after
//! [`LedgerSession::connect`] returns.

use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::block::{parse_gas_price, BlockSummary, RpcBlock};
use crate::config::NodeConfig;
use crate::error::{Result, SessionError};
use crate::network::NetworkSnapshot;
use crate::rpc::{Endpoint, RpcClient, RpcError};
use crate::transfer::{TransferRequest, TransferResult};
use crate::units::{format_ether, parse_quantity, parse_quantity_u64, Wei};

/// Per round-trip timeout when the caller does not pick one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Balance of one account as of one successful query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub account: Address,
    pub wei: Wei,
}

impl Balance {
    /// Whole-coin display, e.g. `9999.999979`.
    pub fn ether(&self) -> String {
        format_ether(self.wei)
    }
}

#[derive(Debug, Clone)]
pub struct LedgerSession {
    rpc: RpcClient,
}

impl LedgerSession {
    /// Record `endpoint` and probe it with [`describe_network`](Self::describe_network).
    pub async fn connect(endpoint: &str) -> Result<Self> {
        Self::connect_with_timeout(endpoint, DEFAULT_REQUEST_TIMEOUT).await
    }

    pub async fn connect_with_config(config: &NodeConfig) -> Result<Self> {
        Self::connect_with_timeout(&config.endpoint, config.request_timeout).await
    }

    pub async fn connect_with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Endpoint::parse(endpoint)?;
        let rpc = RpcClient::new(endpoint, timeout)?;
        let session = Self { rpc };

        match session.describe_network().await {
            Ok(snapshot) => {
                info!(
                    endpoint = %session.endpoint(),
                    chain_id = snapshot.chain_id,
                    network = %snapshot.label,
                    height = snapshot.block_height,
                    "session.connected"
                );
                Ok(session)
            }
            Err(e) => {
                warn!(endpoint = %session.endpoint(), error = %e, "session.probe_failed");
                Err(e)
            }
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.rpc.endpoint()
    }

    /// Chain id and current height, fetched concurrently, combined or not at all.
    pub async fn describe_network(&self) -> Result<NetworkSnapshot> {
        let (chain_id, height) = tokio::try_join!(self.chain_id(), self.block_height())?;
        Ok(NetworkSnapshot::new(chain_id, height))
    }

    /// Accounts managed by the node, in the node's order.
    pub async fn list_accounts(&self) -> Result<Vec<Address>> {
        let raw: Vec<String> = self.rpc.call("eth_accounts", json!([])).await?;
        raw.iter()
            .map(|a| {
                Address::parse(a).map_err(|_| {
                    SessionError::Connection(format!("node returned malformed account '{}'", a))
                })
            })
            .collect()
    }

    pub async fn get_balance(&self, account: &str) -> Result<Balance> {
        let account = Address::parse(account)?;
        let raw: String = self
            .rpc
            .call("eth_getBalance", json!([account, "latest"]))
            .await?;
        let wei = parse_quantity(&raw).map_err(malformed)?;
        debug!(account = %account, wei = %wei, "session.balance");

        Ok(Balance { account, wei })
    }

    /// Height, then the block at that height, then the gas price.
    ///
    /// The three reads are not atomic; the chain may move between them and
    /// the summary is only approximately the latest.
    pub async fn fetch_latest_block(&self) -> Result<BlockSummary> {
        let height = self.block_height().await?;

        let block: Option<RpcBlock> = self
            .rpc
            .call("eth_getBlockByNumber", json!([format!("{:#x}", height), false]))
            .await?;
        let block = block.ok_or_else(|| {
            SessionError::Connection(format!("node has no block at height {}", height))
        })?;

        let raw_price: String = self.rpc.call("eth_gasPrice", json!([])).await?;
        let gas_price = parse_gas_price(&raw_price).map_err(malformed)?;

        BlockSummary::from_rpc(height, block, gas_price).map_err(malformed)
    }

    /// Validate locally, then exactly one `eth_sendTransaction`.
    pub async fn submit_transfer(&self, request: &TransferRequest) -> TransferResult {
        let transfer = request.validate()?;
        info!(transfer = %transfer.describe(), "session.submit_transfer");

        match self
            .rpc
            .call::<String>("eth_sendTransaction", transfer.to_params())
            .await
        {
            Ok(tx_hash) => {
                info!(tx_hash = %tx_hash, "session.transfer_accepted");
                Ok(tx_hash)
            }
            Err(e) => {
                warn!(error = %e, "session.transfer_failed");
                Err(SessionError::Submission(submission_message(e)))
            }
        }
    }

    async fn chain_id(&self) -> Result<u64> {
        let raw: String = self.rpc.call("net_version", json!([])).await?;
        raw.trim()
            .parse()
            .map_err(|_| SessionError::Connection(format!("malformed network id '{}'", raw)))
    }

    async fn block_height(&self) -> Result<u64> {
        let raw: String = self.rpc.call("eth_blockNumber", json!([])).await?;
        parse_quantity_u64(&raw).map_err(malformed)
    }
}

fn malformed(err: crate::units::UnitError) -> SessionError {
    SessionError::Connection(format!("malformed response: {}", err))
}

/// Node errors pass through verbatim; transport failures keep their description.
fn submission_message(err: RpcError) -> String {
    match err {
        RpcError::Node { message, .. } => message,
        other => other.to_string(),
    }
}
