use async_trait::async_trait;
use logware_core::{AuditRecord, TransactionLogRequest};

/// Error returned by a [`CryptoService`] that cannot open a token.
#[derive(Debug, Clone, thiserror::Error)]
#[error("token decryption failed: {reason}")]
pub struct DecryptionError {
    pub reason: String,
}

impl DecryptionError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Opens the opaque session token carried in the `Ccpcontext` header.
pub trait CryptoService: Send + Sync {
    /// Decrypts `token` into the plaintext claims document.
    ///
    /// # Errors
    ///
    /// Returns `DecryptionError` when the token is not a valid ciphertext.
    fn decrypt(&self, token: &str) -> Result<String, DecryptionError>;
}

/// Maps message keys to user-facing text.
#[async_trait]
pub trait LocalizationService: Send + Sync {
    /// Looks up `key` within `domain`. `None` means the caller falls back to
    /// the key itself.
    async fn localize(&self, key: &str, domain: &str) -> Option<String>;
}

/// Client of the transactional logging (saga) subsystem.
#[async_trait]
pub trait TransactionClient: Send + Sync {
    /// Sends one transaction log entry. No response payload is consumed.
    async fn send(&self, request: &TransactionLogRequest) -> anyhow::Result<()>;
}

/// Persistent store for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persists `record`. Returns `false` when the record was not stored;
    /// failures are never escalated.
    async fn try_create(&self, record: AuditRecord) -> bool;
}
