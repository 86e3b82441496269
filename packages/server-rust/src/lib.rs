//! Logware server: call interception for `axum` services.
//!
//! Wrap a router with [`LogwareLayer`] to get, for every call, a validated
//! security context, a request/response audit record, a canonical error
//! payload for every failure and a transaction log relayed after the
//! response.

pub mod adapters;
pub mod logging;
pub mod logware;
pub mod network;
pub mod traits;

pub use logware::{
    BusinessError, Caller, EndpointMetadata, EndpointRegistry, LogwareConfig, LogwareLayer,
};
pub use traits::{AuditSink, CryptoService, DecryptionError, LocalizationService, TransactionClient};
