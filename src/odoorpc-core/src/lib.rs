//! OdooRpc Core Library
//!
//! Wire and data types shared by the client, with no I/O:
//! - JSON-RPC envelopes and request ids
//! - Search domains and their validation
//! - Session state
//! - Connection configuration

pub mod config;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod session;

// Re-export commonly used types
pub use config::{Config, CookiePolicy};
pub use domain::{Domain, DomainTerm};
pub use envelope::{RequestIds, RpcError, RpcRequest, RpcResponse};
pub use error::ValidationError;
pub use session::Session;
