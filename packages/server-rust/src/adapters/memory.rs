//! In-process collaborators.
//!
//! Used by the demo binary when no external service is configured, and by
//! tests that need to observe what the pipeline hands to its collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use logware_core::{AuditRecord, TransactionLogRequest, User, UserDirectory};
use parking_lot::Mutex;

use crate::traits::{AuditSink, LocalizationService, TransactionClient};

/// User directory backed by a concurrent map keyed by user code.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<String, User>,
}

impl InMemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the user with the same code.
    pub fn insert(&self, user: User) {
        self.users.insert(user.user_code.clone(), user);
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn find_user(&self, user_code: &str) -> Option<User> {
        self.users.get(user_code).map(|entry| entry.value().clone())
    }
}

/// Localization table keyed by `(domain, key)`.
#[derive(Debug, Default)]
pub struct StaticLocalizer {
    messages: DashMap<(String, String), String>,
}

impl StaticLocalizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, domain: &str, key: &str, text: impl Into<String>) {
        self.messages
            .insert((domain.to_string(), key.to_string()), text.into());
    }
}

#[async_trait]
impl LocalizationService for StaticLocalizer {
    async fn localize(&self, key: &str, domain: &str) -> Option<String> {
        self.messages
            .get(&(domain.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
    }
}

/// Audit sink that keeps every record in memory.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records stored so far, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn try_create(&self, record: AuditRecord) -> bool {
        self.records.lock().push(record);
        true
    }
}

/// Transaction client that keeps every request it accepted.
///
/// Can be configured to fail every send, or to answer only after a delay.
#[derive(Debug, Default)]
pub struct RecordingTransactionClient {
    sent: Mutex<Vec<TransactionLogRequest>>,
    attempts: AtomicUsize,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingTransactionClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose every send fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// A client that waits `delay` before accepting each request.
    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Requests accepted so far.
    #[must_use]
    pub fn sent(&self) -> Vec<TransactionLogRequest> {
        self.sent.lock().clone()
    }

    /// Number of sends attempted, failed ones included.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TransactionClient for RecordingTransactionClient {
    async fn send(&self, request: &TransactionLogRequest) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            anyhow::bail!("transaction log service unavailable");
        }
        self.sent.lock().push(request.clone());
        Ok(())
    }
}
