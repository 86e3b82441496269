//! Failure taxonomy of the pipeline.
//!
//! The `Display` form of every variant is the message key the exception
//! normalizer localizes. Details that must not reach the caller (parser
//! errors, crypto reasons, panic text) live in fields and only show up in
//! logs and audit records via [`CallError::describe`].

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use logware_core::TokenValidationError;

use super::buffer::BufferError;

/// Every way an intercepted call can fail.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// No `Ccpcontext` header on a call that requires one.
    #[error("ContextIsEmpty")]
    ContextMissing,

    /// `Ccpcontext` header present but not a valid context payload.
    #[error("ContextMalformed")]
    ContextMalformed { reason: String },

    /// The crypto service rejected the session token, or its plaintext was
    /// not a claims document.
    #[error("TokenDecryptionFailed")]
    TokenDecryption { reason: String },

    /// Expiry or environment check failed.
    #[error("{0}")]
    TokenValidation(#[from] TokenValidationError),

    /// Dispatch-time agent resolution yielded nothing.
    #[error("TransactionSagaUserCodeEmpty")]
    AgentCodeMissing,

    /// The transaction client failed or timed out.
    #[error("TransactionSagaSendError")]
    SagaDispatch { reason: String },

    /// Request or response body could not be buffered.
    #[error("{0}")]
    Buffer(#[from] BufferError),

    /// The downstream handler reported a business failure.
    #[error("{0}")]
    Handler(BusinessError),

    /// The downstream handler panicked.
    #[error("UnexpectedError")]
    HandlerPanic { reason: String },

    /// The downstream service returned an error instead of a response.
    #[error("UnexpectedError")]
    Service { reason: String },

    /// The downstream handler did not finish within the call deadline.
    #[error("RequestTimeout")]
    Timeout { after: Duration },
}

impl CallError {
    /// Error code reported to the caller alongside the message, if any.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Handler(err) => err.error_code.as_deref(),
            _ => None,
        }
    }

    /// Whether the failure may be swallowed instead of reaching the caller.
    ///
    /// Only dispatch-time failures qualify: they happen after the response
    /// has been finalized.
    #[must_use]
    pub fn is_swallowable(&self) -> bool {
        matches!(self, Self::AgentCodeMissing | Self::SagaDispatch { .. })
    }

    /// Full internal description, used for logs and the audit record.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::ContextMalformed { reason }
            | Self::TokenDecryption { reason }
            | Self::SagaDispatch { reason }
            | Self::HandlerPanic { reason }
            | Self::Service { reason } => format!("{self}: {reason}"),
            Self::TokenValidation(err) => format!("{self}: {err:?}"),
            Self::Buffer(err) => format!("{self}: {err:?}"),
            Self::Timeout { after } => format!("{self}: no response within {after:?}"),
            Self::Handler(err) => match &err.error_code {
                Some(code) => format!("{err} ({code})"),
                None => err.to_string(),
            },
            Self::ContextMissing | Self::AgentCodeMissing => self.to_string(),
        }
    }
}

/// Business failure raised by a handler.
///
/// Returning it from a handler (directly or through `?`) makes the pipeline
/// answer with the canonical error payload. The message is treated as a
/// localization key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BusinessError {
    pub message: String,
    pub error_code: Option<String>,
}

impl BusinessError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, error_code: impl Into<String>) -> Self {
        self.error_code = Some(error_code.into());
        self
    }
}

impl From<anyhow::Error> for BusinessError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl IntoResponse for BusinessError {
    /// Produces a bodiless placeholder carrying the failure in its
    /// extensions. The logware layer replaces it with the canonical payload.
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn display_is_the_message_key() {
        assert_eq!(CallError::ContextMissing.to_string(), "ContextIsEmpty");
        assert_eq!(
            CallError::ContextMalformed {
                reason: "eof".into()
            }
            .to_string(),
            "ContextMalformed"
        );
        assert_eq!(
            CallError::TokenValidation(TokenValidationError::Expired {
                expired_at: Utc::now()
            })
            .to_string(),
            "TokenExpired"
        );
        assert_eq!(
            CallError::Handler(BusinessError::new("OrderNotFound")).to_string(),
            "OrderNotFound"
        );
    }

    #[test]
    fn describe_keeps_internal_detail() {
        let err = CallError::TokenDecryption {
            reason: "bad padding".into(),
        };
        assert_eq!(err.describe(), "TokenDecryptionFailed: bad padding");
        assert_eq!(err.to_string(), "TokenDecryptionFailed");

        let err = CallError::Timeout {
            after: Duration::from_millis(50),
        };
        assert_eq!(err.to_string(), "RequestTimeout");
        assert_eq!(err.describe(), "RequestTimeout: no response within 50ms");
    }

    #[test]
    fn only_dispatch_failures_are_swallowable() {
        assert!(CallError::AgentCodeMissing.is_swallowable());
        assert!(CallError::SagaDispatch { reason: "x".into() }.is_swallowable());
        assert!(!CallError::ContextMissing.is_swallowable());
        assert!(!CallError::ContextMalformed { reason: "x".into() }.is_swallowable());
        assert!(!CallError::TokenDecryption { reason: "x".into() }.is_swallowable());
        assert!(!CallError::Timeout {
            after: Duration::from_secs(1)
        }
        .is_swallowable());
    }

    #[test]
    fn handler_error_code_is_exposed() {
        let err = CallError::Handler(BusinessError::new("OutOfStock").with_code("ORD-17"));
        assert_eq!(err.error_code(), Some("ORD-17"));
        assert_eq!(err.describe(), "OutOfStock (ORD-17)");
        assert_eq!(CallError::ContextMissing.error_code(), None);
    }

    #[test]
    fn business_error_response_carries_failure() {
        let response = BusinessError::new("OutOfStock").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.extensions().get::<BusinessError>(),
            Some(&BusinessError::new("OutOfStock"))
        );
    }

    #[test]
    fn anyhow_errors_convert() {
        let err: BusinessError = anyhow::anyhow!("InventoryUnavailable").into();
        assert_eq!(err.message, "InventoryUnavailable");
    }
}
