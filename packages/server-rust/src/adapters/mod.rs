//! Concrete implementations of the collaborator traits in [`crate::traits`].
//!
//! - [`crypto`]: token codec for local runs and tests
//! - [`memory`]: in-process directory, localizer and recording sinks
//! - [`http`]: transaction client over HTTP
//! - [`tracing_sink`]: audit sink that writes records to the log

pub mod crypto;
pub mod http;
pub mod memory;
pub mod tracing_sink;

pub use crypto::PlaintextCrypto;
pub use http::HttpTransactionClient;
pub use memory::{
    InMemoryUserDirectory, RecordingAuditSink, RecordingTransactionClient, StaticLocalizer,
};
pub use tracing_sink::TracingAuditSink;
