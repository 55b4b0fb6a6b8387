//! JSON-RPC 2.0 envelopes exchanged with the server

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};

pub const JSONRPC_VERSION: &str = "2.0";

/// Request wrapper posted on every call
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<P> {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<&'static str>,
    pub id: u64,
    pub params: P,
}

impl<P> RpcRequest<P> {
    /// Envelope for `call_kw` business calls (`"method": "call"`)
    pub fn call(id: u64, params: P) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: Some("call"),
            id,
            params,
        }
    }

    /// Envelope for the `/web/session/*` endpoints, which carry no method
    pub fn session(id: u64, params: P) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: None,
            id,
            params,
        }
    }
}

/// `params` of a `call_kw` request
#[derive(Debug, Clone, Serialize)]
pub struct CallParams {
    pub model: String,
    pub method: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl CallParams {
    /// `context` replaces any `context` key already present in `kwargs`.
    pub fn new(
        model: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
        mut kwargs: Map<String, Value>,
        context: Map<String, Value>,
    ) -> Self {
        kwargs.insert("context".to_string(), Value::Object(context));
        Self {
            model: model.into(),
            method: method.into(),
            args,
            kwargs,
        }
    }
}

/// `params` of `/web/session/authenticate`
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticateParams<'a> {
    pub db: &'a str,
    pub login: &'a str,
    pub password: &'a str,
}

/// Empty `params` object for the session check and destroy endpoints
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NoParams {}

/// Decoded response body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// `result` verbatim, or the server error. A missing result is `null`.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// The `error` object of a failed call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Server-side exception message, when the server attached one
    pub fn detail(&self) -> Option<&str> {
        self.data.as_ref()?.get("message")?.as_str()
    }
}

/// Wall-clock request ids, bumped so each id is strictly greater than the
/// last one handed out. Ids are never used to match responses.
#[derive(Debug, Default)]
pub struct RequestIds {
    last: AtomicU64,
}

impl RequestIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let prev = match self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            }) {
            Ok(prev) | Err(prev) => prev,
        };
        now.max(prev + 1)
    }
}
