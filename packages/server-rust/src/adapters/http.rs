//! Transaction client that posts log entries to the saga service over HTTP.

use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use logware_core::TransactionLogRequest;
use reqwest::Client;
use serde::Serialize;

use crate::traits::TransactionClient;

/// Default path of the saga endpoint, relative to the service base URL.
pub const DEFAULT_TRANSACTION_LOG_PATH: &str = "/saga/transaction-log";

/// Body of the saga call. The service expects the entry wrapped.
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct LogTransactionSagaRequest<'a> {
    transaction_log_request: &'a TransactionLogRequest,
}

/// Posts every [`TransactionLogRequest`] to `{base_url}{path}`.
///
/// Any non-2xx answer is a failure. The response body is never read.
#[derive(Debug, Clone)]
pub struct HttpTransactionClient {
    client: Client,
    url: String,
}

impl HttpTransactionClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Self::with_path(base_url, DEFAULT_TRANSACTION_LOG_PATH, timeout)
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_path(base_url: &str, path: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building transaction log HTTP client")?;

        Ok(Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), path),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TransactionClient for HttpTransactionClient {
    async fn send(&self, request: &TransactionLogRequest) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(&LogTransactionSagaRequest {
                transaction_log_request: request,
            })
            .send()
            .await
            .with_context(|| format!("posting transaction log to {}", self.url))?
            .error_for_status()
            .context("transaction log rejected")?;
        Ok(())
    }
}
