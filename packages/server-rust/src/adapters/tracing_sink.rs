//! Audit sink that emits each record as a structured log event.

use async_trait::async_trait;
use logware_core::AuditRecord;
use tracing::{info, warn};

use crate::traits::AuditSink;

/// Target of the emitted events, so they can be routed with an `EnvFilter`
/// directive such as `logware::audit=info`.
pub const AUDIT_TARGET: &str = "logware::audit";

/// Writes audit records to the log instead of a database.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn try_create(&self, record: AuditRecord) -> bool {
        match serde_json::to_string(&record) {
            Ok(json) => {
                info!(
                    target: AUDIT_TARGET,
                    application = %record.application_name,
                    path = %record.method_path,
                    is_exception = record.is_exception,
                    record = %json,
                    "audit"
                );
                true
            }
            Err(e) => {
                warn!(target: AUDIT_TARGET, error = %e, "audit record not serializable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn accepts_records() {
        let record = AuditRecord::begin("orders-api", "/orders", Utc::now()).finish(Utc::now());
        assert!(TracingAuditSink.try_create(record).await);
    }
}
