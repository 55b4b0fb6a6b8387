//! OdooRpc Client Library
//!
//! Async client for Odoo's JSON-RPC web endpoints: session lifecycle,
//! `call_kw` dispatch and a chainable per-model query builder.

mod client;
mod model;
pub mod transport;

pub use client::Client;
pub use model::{Model, Record};
pub use odoorpc_core::{Config, CookiePolicy, Domain, DomainTerm, Session, ValidationError};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Authentication error: {status}")]
    Auth { status: u16 },

    #[error("HTTP error! status: {status} {status_text}")]
    Transport { status: u16, status_text: String },

    #[error("{message}")]
    Protocol {
        message: String,
        code: Option<i64>,
        data: Option<serde_json::Value>,
    },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

impl From<odoorpc_core::RpcError> for ClientError {
    fn from(error: odoorpc_core::RpcError) -> Self {
        ClientError::Protocol {
            message: error.message,
            code: error.code,
            data: error.data,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
