//! Turns any failure into the one canonical error response.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use logware_core::ErrorPayload;
use tracing::debug;

use super::error::CallError;
use crate::traits::LocalizationService;

/// Produces every error body the pipeline ever returns.
///
/// The message is the localized form of the failure's message key, or the
/// key itself when no localization is available. The status code is the
/// same for every failure.
pub struct ExceptionNormalizer {
    localizer: Option<Arc<dyn LocalizationService>>,
    domain: String,
    status: StatusCode,
}

impl ExceptionNormalizer {
    #[must_use]
    pub fn new(
        localizer: Option<Arc<dyn LocalizationService>>,
        domain: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            localizer,
            domain: domain.into(),
            status,
        }
    }

    /// Builds the payload for `err`.
    pub async fn payload(&self, err: &CallError) -> ErrorPayload {
        let key = err.to_string();
        let message = match &self.localizer {
            Some(localizer) => localizer.localize(&key, &self.domain).await,
            None => None,
        };

        let message = message.unwrap_or_else(|| {
            debug!(key = %key, domain = %self.domain, "no localization, using raw key");
            key
        });

        ErrorPayload::business_failure(message, err.error_code().map(str::to_string))
    }

    /// Builds the complete response for `err`.
    ///
    /// The response is always a fresh one: nothing the failed call wrote
    /// is carried over.
    pub async fn render(&self, err: &CallError) -> Response {
        let payload = self.payload(err).await;
        (self.status, Json(payload)).into_response()
    }
}
