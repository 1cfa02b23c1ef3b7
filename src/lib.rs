//! transferdesk - account, balance and transfer client for local development nodes
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Session
//! - [`session`] - `LedgerSession`: connect, network, accounts, balances, blocks, transfers
//! - [`state`] - Caller-owned desk state driving a front-end
//!
//! ## Ledger Types
//! - [`address`] - Account addresses
//! - [`units`] - Exact wei / ether / gwei conversions
//! - [`network`] - Network snapshots and chain labels
//! - [`block`] - Latest-block summaries
//! - [`transfer`] - Transfer requests and validation
//!
//! ## Transport
//! - [`rpc`] - JSON-RPC 2.0 envelopes and the HTTP client
//! - [`devnode`] - In-memory development node (feature `devnode`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Session
// ============================================================================
pub mod session;
pub mod state;

// ============================================================================
// Ledger Types
// ============================================================================
pub mod address;
pub mod block;
pub mod network;
pub mod transfer;
pub mod units;

// ============================================================================
// Transport
// ============================================================================
#[cfg(feature = "devnode")]
pub mod devnode;
pub mod rpc;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use address::Address;
pub use error::{Result, SessionError};
pub use session::{Balance, LedgerSession};
pub use state::DeskState;
pub use transfer::{TransferRequest, TransferResult};
