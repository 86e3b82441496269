use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One request/response audit trail entry.
///
/// Opened when a call starts (path and request time are known at once),
/// filled in as the bodies become available, and closed with
/// [`AuditRecord::finish`] right before it is handed to the audit sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuditRecord {
    pub application_name: String,
    /// Request path of the call, e.g. `/orders`.
    pub method_path: String,
    pub request_body: Option<String>,
    /// Response text, or the failure description when `is_exception` is set.
    pub response_body: Option<String>,
    pub request_time: DateTime<Utc>,
    pub response_time: Option<DateTime<Utc>>,
    pub is_exception: bool,
}

impl AuditRecord {
    /// Opens a record for a call that started at `request_time`.
    #[must_use]
    pub fn begin(
        application_name: impl Into<String>,
        method_path: impl Into<String>,
        request_time: DateTime<Utc>,
    ) -> Self {
        Self {
            application_name: application_name.into(),
            method_path: method_path.into(),
            request_body: None,
            response_body: None,
            request_time,
            response_time: None,
            is_exception: false,
        }
    }

    pub fn capture_request(&mut self, body: String) {
        self.request_body = Some(body);
    }

    pub fn capture_response(&mut self, body: String) {
        self.response_body = Some(body);
    }

    /// Marks the call as terminated by a failure.
    ///
    /// Overwrites any response text captured earlier.
    pub fn fail(&mut self, description: String) {
        self.is_exception = true;
        self.response_body = Some(description);
    }

    /// Stamps the response time and releases the record for persistence.
    #[must_use]
    pub fn finish(mut self, response_time: DateTime<Utc>) -> Self {
        self.response_time = Some(response_time);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_overrides_captured_response() {
        let started = Utc::now();
        let mut record = AuditRecord::begin("orders-api", "/orders", started);
        record.capture_request("{\"qty\":1}".to_string());
        record.capture_response("{\"ok\":true}".to_string());
        record.fail("ContextIsEmpty".to_string());

        let record = record.finish(started + chrono::Duration::milliseconds(5));
        assert!(record.is_exception);
        assert_eq!(record.request_body.as_deref(), Some("{\"qty\":1}"));
        assert_eq!(record.response_body.as_deref(), Some("ContextIsEmpty"));
        assert!(record.response_time.unwrap() >= record.request_time);
    }

    #[test]
    fn fresh_record_has_no_bodies() {
        let record = AuditRecord::begin("orders-api", "/orders", Utc::now());
        assert!(record.request_body.is_none());
        assert!(record.response_body.is_none());
        assert!(record.response_time.is_none());
        assert!(!record.is_exception);
    }
}
