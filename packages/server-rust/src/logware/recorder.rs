//! Best-effort persistence of audit records.

use std::sync::Arc;
use std::time::Duration;

use logware_core::AuditRecord;
use tracing::{debug, warn};

use crate::traits::AuditSink;

/// Outcome of one audit write. The pipeline records it on the call span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Stored,
    Rejected,
    TimedOut,
}

impl RecordOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Rejected => "rejected",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Hands finished audit records to the audit sink.
///
/// Never fails and never waits longer than `timeout`.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
    timeout: Duration,
}

impl AuditRecorder {
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    pub async fn record(&self, record: AuditRecord) -> RecordOutcome {
        let method_path = record.method_path.clone();
        let is_exception = record.is_exception;

        match tokio::time::timeout(self.timeout, self.sink.try_create(record)).await {
            Ok(true) => {
                debug!(path = %method_path, is_exception, "audit record stored");
                RecordOutcome::Stored
            }
            Ok(false) => {
                warn!(path = %method_path, "audit sink rejected record");
                RecordOutcome::Rejected
            }
            Err(_elapsed) => {
                warn!(
                    path = %method_path,
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "audit sink timed out"
                );
                RecordOutcome::TimedOut
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::adapters::memory::RecordingAuditSink;

    struct RejectingSink;

    #[async_trait]
    impl AuditSink for RejectingSink {
        async fn try_create(&self, _record: AuditRecord) -> bool {
            false
        }
    }

    struct StalledSink;

    #[async_trait]
    impl AuditSink for StalledSink {
        async fn try_create(&self, _record: AuditRecord) -> bool {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            true
        }
    }

    fn record() -> AuditRecord {
        AuditRecord::begin("orders-api", "/orders", Utc::now()).finish(Utc::now())
    }

    #[tokio::test]
    async fn stores_record() {
        let sink = Arc::new(RecordingAuditSink::new());
        let recorder = AuditRecorder::new(sink.clone(), Duration::from_secs(1));

        assert_eq!(recorder.record(record()).await, RecordOutcome::Stored);
        assert_eq!(sink.records().len(), 1);
        assert_eq!(sink.records()[0].method_path, "/orders");
    }

    #[tokio::test]
    async fn rejection_is_not_escalated() {
        let recorder = AuditRecorder::new(Arc::new(RejectingSink), Duration::from_secs(1));
        assert_eq!(recorder.record(record()).await, RecordOutcome::Rejected);
    }

    #[test]
    fn outcomes_have_span_names() {
        assert_eq!(RecordOutcome::Stored.as_str(), "stored");
        assert_eq!(RecordOutcome::Rejected.as_str(), "rejected");
        assert_eq!(RecordOutcome::TimedOut.as_str(), "timed_out");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_sink_is_abandoned() {
        let recorder = AuditRecorder::new(Arc::new(StalledSink), Duration::from_millis(50));
        assert_eq!(recorder.record(record()).await, RecordOutcome::TimedOut);
    }
}
