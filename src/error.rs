//! Error types for transferdesk

use std::fmt;

use crate::rpc::RpcError;

/// Every failure a session operation can surface to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Node unreachable, timed out, or answered a read query with garbage.
    Connection(String),
    /// Caller input rejected locally; no node call was made.
    Validation(String),
    /// The node reported failure for a transfer submission.
    Submission(String),
}

impl SessionError {
    pub fn is_connection(&self) -> bool {
        matches!(self, SessionError::Connection(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, SessionError::Validation(_))
    }

    pub fn is_submission(&self) -> bool {
        matches!(self, SessionError::Submission(_))
    }

    /// The bare message, without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            SessionError::Connection(msg)
            | SessionError::Validation(msg)
            | SessionError::Submission(msg) => msg,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionError::Connection(msg) => write!(f, "Connection error: {}", msg),
            SessionError::Validation(msg) => write!(f, "Validation error: {}", msg),
            SessionError::Submission(msg) => write!(f, "Transaction failed: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

/// Read queries map every transport or node failure onto a connection error.
impl From<RpcError> for SessionError {
    fn from(err: RpcError) -> Self {
        SessionError::Connection(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, SessionError>;
