use serde::{Deserialize, Serialize};

/// The only error body a caller ever receives.
///
/// Property names are serialized exactly as declared here, with no case
/// transformation: `ErrorMessage`, `ErrorCode`, `IsBusinessFailure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(rename = "ErrorMessage")]
    pub message: String,
    #[serde(rename = "ErrorCode", default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(rename = "IsBusinessFailure")]
    pub is_business_failure: bool,
}

impl ErrorPayload {
    #[must_use]
    pub fn business_failure(message: impl Into<String>, error_code: Option<String>) -> Self {
        Self {
            message: message.into(),
            error_code,
            is_business_failure: true,
        }
    }
}
