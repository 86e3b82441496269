//! Logware core: per-call security context, token claims, audit and transaction log records.

pub mod audit;
pub mod claims;
pub mod context;
pub mod payload;
pub mod traits;
pub mod transaction;
pub mod types;

pub use audit::AuditRecord;
pub use claims::{Agent, DecryptedCall, DecryptedClaims, TokenPolicy, TokenValidationError};
pub use context::{CallContext, RawCallContext};
pub use payload::ErrorPayload;
pub use traits::{EmptyDirectory, UserDirectory};
pub use transaction::TransactionLogRequest;
pub use types::{User, UNKNOWN_BRANCH};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
