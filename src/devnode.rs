//! In-memory development node
//!
//! Serves the Ethereum-style JSON-RPC subset a [`LedgerSession`] needs over
//! HTTP, backed by a toy ledger: a fixed set of funded, node-managed
//! accounts, a fixed gas price and one freshly mined block per accepted
//! transfer. There are no signatures, no consensus and nothing on disk.
//!
//! [`LedgerSession`]: crate::session::LedgerSession

use axum::{
    body::Bytes,
    extract::{Request, State},
    http,
    middleware::{self, Next},
    response::Response,
    routing::post,
    Json, Router,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::address::{Address, ADDRESS_LEN};
use crate::config::DevNodeConfig;
use crate::rpc::{
    RpcErrorObject, RpcRequest, RpcResponse, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR, SERVER_ERROR,
};
use crate::transfer::TRANSFER_GAS;
use crate::units::{parse_quantity, parse_quantity_u64, to_quantity, Wei, WEI_PER_ETHER, WEI_PER_GWEI};

const CLIENT_VERSION: &str = concat!("transferdesk-devnode/v", env!("CARGO_PKG_VERSION"));
const BLOCK_GAS_LIMIT: u64 = 30_000_000;
const ACCOUNT_SEED: &[u8] = b"transferdesk-devnode-account";

pub const ERR_INSUFFICIENT_FUNDS: &str = "insufficient funds for gas * price + value";
pub const ERR_INTRINSIC_GAS: &str = "intrinsic gas too low";
pub const ERR_UNKNOWN_SENDER: &str = "sender account not recognized";

#[derive(Debug, Clone)]
pub struct DevNodeOptions {
    pub chain_id: u64,
    pub accounts: usize,
    /// Whole coins per managed account.
    pub initial_balance: u64,
    pub gas_price: Wei,
}

impl Default for DevNodeOptions {
    fn default() -> Self {
        Self::from(&DevNodeConfig::default())
    }
}

impl From<&DevNodeConfig> for DevNodeOptions {
    fn from(config: &DevNodeConfig) -> Self {
        Self {
            chain_id: config.chain_id,
            accounts: config.accounts,
            initial_balance: config.initial_balance,
            gas_price: Wei::from(config.gas_price_gwei) * WEI_PER_GWEI,
        }
    }
}

#[derive(Debug, Clone)]
struct DevBlock {
    number: u64,
    hash: [u8; 32],
    parent_hash: [u8; 32],
    timestamp: u64,
    transactions: Vec<String>,
}

#[derive(Debug, Clone)]
struct DevTx {
    hash: String,
    from: Address,
    to: Address,
    value: Wei,
    gas: u64,
    nonce: u64,
    block_number: u64,
}

#[derive(Debug)]
struct Ledger {
    chain_id: u64,
    gas_price: Wei,
    accounts: Vec<Address>,
    balances: HashMap<Address, Wei>,
    nonces: HashMap<Address, u64>,
    blocks: Vec<DevBlock>,
    transactions: HashMap<String, DevTx>,
}

impl Ledger {
    fn new(options: &DevNodeOptions) -> Self {
        let accounts: Vec<Address> = (0..options.accounts).map(|i| derive_account(i as u32)).collect();
        let funding = Wei::from(options.initial_balance).saturating_mul(WEI_PER_ETHER);
        let balances = accounts.iter().map(|a| (a.clone(), funding)).collect();

        let genesis_time = now_secs();
        let genesis = DevBlock {
            number: 0,
            hash: block_hash(&[0u8; 32], 0, genesis_time, &[]),
            parent_hash: [0u8; 32],
            timestamp: genesis_time,
            transactions: Vec::new(),
        };

        Self {
            chain_id: options.chain_id,
            gas_price: options.gas_price,
            accounts,
            balances,
            nonces: HashMap::new(),
            blocks: vec![genesis],
            transactions: HashMap::new(),
        }
    }

    fn head(&self) -> &DevBlock {
        // The genesis block is created in `new` and blocks are never removed.
        &self.blocks[self.blocks.len() - 1]
    }

    fn balance_of(&self, account: &Address) -> Wei {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn block_by_tag(&self, tag: &str) -> Result<Option<&DevBlock>, RpcErrorObject> {
        match tag {
            "latest" | "pending" | "safe" | "finalized" => Ok(Some(self.head())),
            "earliest" => Ok(self.blocks.first()),
            hex => {
                let number = parse_quantity_u64(hex)
                    .map_err(|e| RpcErrorObject::new(INVALID_PARAMS, e.to_string()))?;
                Ok(usize::try_from(number).ok().and_then(|n| self.blocks.get(n)))
            }
        }
    }

    /// Debit, credit and mine the transfer into a new block.
    fn apply_transfer(&mut self, tx: SendTransaction) -> Result<String, RpcErrorObject> {
        let from = Address::parse(&tx.from)
            .map_err(|e| RpcErrorObject::new(INVALID_PARAMS, e.message()))?;
        let to = match tx.to.as_deref() {
            Some(to) => Address::parse(to).map_err(|e| RpcErrorObject::new(INVALID_PARAMS, e.message()))?,
            None => {
                return Err(RpcErrorObject::new(
                    SERVER_ERROR,
                    "contract creation is not supported",
                ))
            }
        };
        let value = optional_quantity(tx.value.as_deref())?.unwrap_or(0);
        let gas = match optional_quantity(tx.gas.as_deref())? {
            Some(g) => u64::try_from(g).map_err(|_| RpcErrorObject::new(INVALID_PARAMS, "gas out of range"))?,
            None => TRANSFER_GAS,
        };

        if !self.accounts.contains(&from) {
            return Err(RpcErrorObject::new(SERVER_ERROR, ERR_UNKNOWN_SENDER));
        }
        if gas < TRANSFER_GAS {
            return Err(RpcErrorObject::new(SERVER_ERROR, ERR_INTRINSIC_GAS));
        }

        // Upfront check covers the whole gas limit; only the gas used is charged.
        let upfront = Wei::from(gas)
            .checked_mul(self.gas_price)
            .and_then(|g| g.checked_add(value))
            .ok_or_else(|| RpcErrorObject::new(SERVER_ERROR, ERR_INSUFFICIENT_FUNDS))?;
        let sender_balance = self.balance_of(&from);
        if sender_balance < upfront {
            return Err(RpcErrorObject::new(SERVER_ERROR, ERR_INSUFFICIENT_FUNDS));
        }
        let fee = Wei::from(TRANSFER_GAS) * self.gas_price;

        let nonce = self.nonces.get(&from).copied().unwrap_or(0);
        let hash = tx_hash(&from, &to, value, nonce);

        self.balances.insert(from.clone(), sender_balance - value - fee);
        let recipient_balance = self.balance_of(&to);
        self.balances.insert(to.clone(), recipient_balance.saturating_add(value));
        self.nonces.insert(from.clone(), nonce + 1);

        let parent = self.head().clone();
        let number = parent.number + 1;
        let timestamp = now_secs().max(parent.timestamp);
        let transactions = vec![hash.clone()];
        self.blocks.push(DevBlock {
            number,
            hash: block_hash(&parent.hash, number, timestamp, &transactions),
            parent_hash: parent.hash,
            timestamp,
            transactions,
        });

        self.transactions.insert(
            hash.clone(),
            DevTx {
                hash: hash.clone(),
                from,
                to,
                value,
                gas,
                nonce,
                block_number: number,
            },
        );

        Ok(hash)
    }

    fn block_json(&self, block: &DevBlock, full: bool) -> Value {
        let transactions: Vec<Value> = if full {
            block
                .transactions
                .iter()
                .filter_map(|h| self.transactions.get(h))
                .map(|tx| self.tx_json(tx))
                .collect()
        } else {
            block.transactions.iter().map(|h| json!(h)).collect()
        };

        json!({
            "number": to_quantity(block.number),
            "hash": format!("0x{}", hex::encode(block.hash)),
            "parentHash": format!("0x{}", hex::encode(block.parent_hash)),
            "timestamp": to_quantity(block.timestamp),
            "gasLimit": to_quantity(BLOCK_GAS_LIMIT),
            "gasUsed": to_quantity(TRANSFER_GAS * block.transactions.len() as u64),
            "miner": Address::from_bytes([0u8; ADDRESS_LEN]),
            "transactions": transactions,
        })
    }

    fn tx_json(&self, tx: &DevTx) -> Value {
        let block_hash = self
            .blocks
            .get(tx.block_number as usize)
            .map(|b| format!("0x{}", hex::encode(b.hash)));
        json!({
            "hash": tx.hash,
            "from": tx.from,
            "to": tx.to,
            "value": to_quantity(tx.value),
            "gas": to_quantity(tx.gas),
            "gasPrice": to_quantity(self.gas_price),
            "nonce": to_quantity(tx.nonce),
            "blockNumber": to_quantity(tx.block_number),
            "blockHash": block_hash,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SendTransaction {
    from: String,
    to: Option<String>,
    value: Option<String>,
    gas: Option<String>,
}

/// Shared handle to one dev ledger; clones observe the same state.
#[derive(Clone)]
pub struct DevNode {
    ledger: Arc<Mutex<Ledger>>,
    requests: Arc<AtomicU64>,
}

impl DevNode {
    pub fn new(options: DevNodeOptions) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::new(&options))),
            requests: Arc::new(AtomicU64::new(0)),
        }
    }

    /// HTTP requests received so far (a batch counts once).
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn accounts(&self) -> Vec<Address> {
        self.ledger.lock().accounts.clone()
    }

    pub fn balance_of(&self, account: &Address) -> Wei {
        self.ledger.lock().balance_of(account)
    }

    pub fn block_height(&self) -> u64 {
        self.ledger.lock().head().number
    }

    pub fn gas_price(&self) -> Wei {
        self.ledger.lock().gas_price
    }

    /// Answer one JSON-RPC request.
    pub fn handle(&self, request: RpcRequest) -> RpcResponse {
        let id = request.id.clone();
        if request.jsonrpc != crate::rpc::JSONRPC_VERSION {
            return RpcResponse::failure(
                id,
                RpcErrorObject::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""),
            );
        }

        match self.dispatch(&request.method, &request.params) {
            Ok(result) => RpcResponse::success(id, result),
            Err(error) => {
                tracing::debug!(method = %request.method, code = error.code, message = %error.message, "devnode.rpc_error");
                RpcResponse::failure(id, error)
            }
        }
    }

    /// Answer a raw HTTP body: a single request or a batch.
    pub fn handle_body(&self, body: &[u8]) -> Value {
        let parsed: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                return json!(RpcResponse::failure(
                    Value::Null,
                    RpcErrorObject::new(PARSE_ERROR, format!("parse error: {}", e)),
                ))
            }
        };

        match parsed {
            Value::Array(items) if !items.is_empty() => {
                Value::Array(items.into_iter().map(|item| json!(self.handle_value(item))).collect())
            }
            single => json!(self.handle_value(single)),
        }
    }

    fn handle_value(&self, value: Value) -> RpcResponse {
        match serde_json::from_value::<RpcRequest>(value) {
            Ok(request) => self.handle(request),
            Err(e) => RpcResponse::failure(
                Value::Null,
                RpcErrorObject::new(INVALID_REQUEST, format!("invalid request: {}", e)),
            ),
        }
    }

    fn dispatch(&self, method: &str, params: &Value) -> Result<Value, RpcErrorObject> {
        match method {
            "web3_clientVersion" => Ok(json!(CLIENT_VERSION)),
            "net_version" => Ok(json!(self.ledger.lock().chain_id.to_string())),
            "eth_chainId" => Ok(json!(to_quantity(self.ledger.lock().chain_id))),
            "eth_blockNumber" => Ok(json!(to_quantity(self.block_height()))),
            "eth_gasPrice" => Ok(json!(to_quantity(self.gas_price()))),
            "eth_accounts" => Ok(json!(self.accounts())),
            "eth_getBalance" => {
                let account = address_param(params, 0)?;
                Ok(json!(to_quantity(self.balance_of(&account))))
            }
            "eth_getTransactionCount" => {
                let account = address_param(params, 0)?;
                let nonce = self.ledger.lock().nonces.get(&account).copied().unwrap_or(0);
                Ok(json!(to_quantity(nonce)))
            }
            "eth_getBlockByNumber" => {
                let tag: String = param(params, 0)?;
                let full: bool = optional_param(params, 1)?.unwrap_or(false);
                let ledger = self.ledger.lock();
                Ok(ledger
                    .block_by_tag(&tag)?
                    .map(|block| ledger.block_json(block, full))
                    .unwrap_or(Value::Null))
            }
            "eth_getTransactionByHash" => {
                let hash: String = param(params, 0)?;
                let ledger = self.ledger.lock();
                Ok(ledger
                    .transactions
                    .get(&hash.to_ascii_lowercase())
                    .map(|tx| ledger.tx_json(tx))
                    .unwrap_or(Value::Null))
            }
            "eth_sendTransaction" => {
                let tx: SendTransaction = param(params, 0)?;
                let hash = self.ledger.lock().apply_transfer(tx)?;
                tracing::info!(tx_hash = %hash, height = self.block_height(), "devnode.block_mined");
                Ok(json!(hash))
            }
            other => Err(RpcErrorObject::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        }
    }

    /// Router answering JSON-RPC on `POST /`.
    pub fn router(self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(vec![http::Method::POST, http::Method::OPTIONS])
            .allow_headers(vec![http::header::CONTENT_TYPE]);

        Router::new()
            .route("/", post(rpc_handler))
            .layer(middleware::from_fn_with_state(self.clone(), logging_middleware))
            .with_state(self)
            .layer(cors)
    }

    /// Serve on an already bound listener until the task is dropped.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, self.router()).await
    }

    /// Bind an ephemeral loopback port and serve in the background.
    pub async fn spawn(self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            if let Err(e) = self.serve(listener).await {
                tracing::error!(error = %e, "devnode.serve_failed");
            }
        });
        Ok((addr, handle))
    }
}

async fn rpc_handler(State(node): State<DevNode>, body: Bytes) -> Json<Value> {
    Json(node.handle_body(&body))
}

/// Counts and logs every HTTP request.
async fn logging_middleware(State(node): State<DevNode>, req: Request, next: Next) -> Response {
    node.requests.fetch_add(1, Ordering::SeqCst);
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "devnode.request"
    );

    response
}

fn param<T: DeserializeOwned>(params: &Value, index: usize) -> Result<T, RpcErrorObject> {
    optional_param(params, index)?.ok_or_else(|| {
        RpcErrorObject::new(INVALID_PARAMS, format!("missing parameter at position {}", index))
    })
}

fn optional_param<T: DeserializeOwned>(params: &Value, index: usize) -> Result<Option<T>, RpcErrorObject> {
    match params.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone()).map(Some).map_err(|e| {
            RpcErrorObject::new(INVALID_PARAMS, format!("invalid parameter at position {}: {}", index, e))
        }),
    }
}

fn address_param(params: &Value, index: usize) -> Result<Address, RpcErrorObject> {
    let raw: String = param(params, index)?;
    Address::parse(&raw).map_err(|e| RpcErrorObject::new(INVALID_PARAMS, e.message()))
}

fn optional_quantity(raw: Option<&str>) -> Result<Option<Wei>, RpcErrorObject> {
    raw.map(|q| parse_quantity(q).map_err(|e| RpcErrorObject::new(INVALID_PARAMS, e.to_string())))
        .transpose()
}

fn derive_account(index: u32) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(ACCOUNT_SEED);
    hasher.update(index.to_be_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; ADDRESS_LEN];
    bytes.copy_from_slice(&digest[..ADDRESS_LEN]);
    Address::from_bytes(bytes)
}

fn tx_hash(from: &Address, to: &Address, value: Wei, nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(from.to_lowercase().as_bytes());
    hasher.update(to.to_lowercase().as_bytes());
    hasher.update(value.to_be_bytes());
    hasher.update(nonce.to_be_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

fn block_hash(parent: &[u8; 32], number: u64, timestamp: u64, transactions: &[String]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(parent);
    hasher.update(number.to_be_bytes());
    hasher.update(timestamp.to_be_bytes());
    for tx in transactions {
        hasher.update(tx.as_bytes());
    }
    hasher.finalize().into()
}

fn now_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}
