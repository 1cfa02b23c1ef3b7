//! JSON-RPC 2.0 over HTTP
//!
//! Envelope types shared by the client transport and the dev node, plus
//! [`RpcClient`], a thin `reqwest` wrapper that issues one POST per call.

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::error::SessionError;

pub const JSONRPC_VERSION: &str = "2.0";

/// Where a local development node listens unless told otherwise.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8545";

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
/// Generic server-side failure used by Ethereum nodes for rejected transactions.
pub const SERVER_ERROR: i64 = -32000;

/// Calls never overlap on one connection, so a constant id is enough.
const REQUEST_ID: u64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Value::from(REQUEST_ID),
            method: method.to_string(),
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    /// `Some(Value::Null)` is a legitimate `null` result, `None` means absent.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

fn present<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: RpcErrorObject) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    #[error("node unreachable: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("node answered HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    /// The node processed the call and returned a JSON-RPC error object.
    #[error("{message}")]
    Node { code: i64, message: String },
}

/// Connection target of a session. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Accepts a full `http(s)://` URL or a bare `host:port`.
    pub fn parse(input: &str) -> Result<Self, SessionError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(SessionError::Validation("Endpoint is required".to_string()));
        }

        let candidate = if s.contains("://") {
            s.to_string()
        } else {
            format!("http://{}", s)
        };

        let url = Url::parse(&candidate)
            .map_err(|e| SessionError::Validation(format!("Invalid endpoint '{}': {}", s, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(SessionError::Validation(format!(
                "Unsupported endpoint scheme '{}'",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(SessionError::Validation(format!(
                "Endpoint '{}' has no host",
                s
            )));
        }

        Ok(Endpoint(url))
    }

    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// HTTP transport bound to one endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    endpoint: Endpoint,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Issue one call and decode its `result` as `R`.
    pub async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R, RpcError> {
        let result = self.call_raw(method, params).await?;
        serde_json::from_value(result)
            .map_err(|e| RpcError::Malformed(format!("unexpected result for {}: {}", method, e)))
    }

    pub async fn call_raw(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let request = RpcRequest::new(method, params);
        tracing::debug!(method = %method, endpoint = %self.endpoint, "rpc.call");

        let response = self
            .http
            .post(self.endpoint.url().clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        // Nodes may pair a non-2xx status with a JSON-RPC error body; prefer the body.
        let envelope: RpcResponse = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(RpcError::Malformed(format!("invalid JSON-RPC body: {}", e)))
            }
            Err(_) => {
                return Err(RpcError::Http {
                    status: status.as_u16(),
                    body,
                })
            }
        };

        if let Some(err) = envelope.error {
            tracing::debug!(method = %method, code = err.code, message = %err.message, "rpc.error");
            return Err(RpcError::Node {
                code: err.code,
                message: err.message,
            });
        }

        envelope
            .result
            .ok_or_else(|| RpcError::Malformed(format!("{} response has no result", method)))
    }

    fn transport_error(&self, err: reqwest::Error) -> RpcError {
        if err.is_timeout() {
            RpcError::Timeout(self.timeout)
        } else {
            RpcError::Transport(err.to_string())
        }
    }
}
