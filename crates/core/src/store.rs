//! Repository interfaces the engine depends on.
//!
//! The services never see a concrete store: they hold `Arc<dyn ...>` trait
//! objects. `lexledger-db` implements these over PostgreSQL and
//! [`crate::memory::InMemoryStore`] implements them for tests and embedding.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::audit::{AuditEvent, AuditFilter, NewAuditEvent};
use crate::diff::{DiffKey, VersionDiffResult};
use crate::document::{Document, DocumentVersion, VersionSnapshot};
use crate::share::{NewAccessLogEntry, NewShare, SecureShare, ShareAccessLogEntry};
use crate::types::{DbId, Timestamp, VersionNumber};

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Store-layer failures. None of these are retried inside the engine.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The call did not finish within the configured deadline.
    #[error("store operation '{operation}' timed out")]
    Timeout { operation: &'static str },

    #[error("store connection error: {0}")]
    Connection(String),

    /// A uniqueness constraint rejected the write (slug or version number).
    #[error("store conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Timeouts, dropped connections and write conflicts may succeed on retry.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Backend(_))
    }
}

/// Run a store call under a deadline, surfacing expiry as [`StoreError::Timeout`].
pub async fn bounded<T, F>(limit: Duration, operation: &'static str, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, timeout_ms = limit.as_millis() as u64, "Store call timed out");
            Err(StoreError::Timeout { operation })
        }
    }
}

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

/// Documents and their immutable version snapshots.
#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn load_document(&self, document_id: DbId) -> Result<Option<Document>, StoreError>;

    async fn list_documents(&self, organization_id: DbId) -> Result<Vec<Document>, StoreError>;

    async fn load_version(
        &self,
        document_id: DbId,
        version_number: VersionNumber,
    ) -> Result<Option<DocumentVersion>, StoreError>;

    /// Versions ordered newest first, at most `limit` when given.
    async fn list_versions(
        &self,
        document_id: DbId,
        limit: Option<usize>,
    ) -> Result<Vec<DocumentVersion>, StoreError>;

    /// Append a snapshot and advance the document's `current_version`.
    ///
    /// Must fail with [`StoreError::Conflict`] when the version number is
    /// already taken or is not exactly `current_version + 1`.
    async fn append_version(&self, snapshot: VersionSnapshot) -> Result<DocumentVersion, StoreError>;
}

// ---------------------------------------------------------------------------
// Shares
// ---------------------------------------------------------------------------

/// Share configuration, counters and the access log.
#[async_trait]
pub trait ShareStore: Send + Sync {
    async fn load_share(&self, slug: &str) -> Result<Option<SecureShare>, StoreError>;

    async fn load_share_by_id(&self, share_id: DbId) -> Result<Option<SecureShare>, StoreError>;

    /// Persist a new share. A slug collision is a [`StoreError::Conflict`].
    async fn save_share(&self, share: NewShare) -> Result<SecureShare, StoreError>;

    async fn list_shares_for_document(&self, document_id: DbId) -> Result<Vec<SecureShare>, StoreError>;

    async fn list_shares_for_organization(
        &self,
        organization_id: DbId,
    ) -> Result<Vec<SecureShare>, StoreError>;

    /// Atomically increment `view_count` only if the share is still active
    /// and under its view budget. Returns the updated share, or `None` when
    /// the condition no longer held.
    async fn try_increment_views(&self, share_id: DbId) -> Result<Option<SecureShare>, StoreError>;

    /// Download-counter counterpart of [`try_increment_views`](Self::try_increment_views).
    async fn try_increment_downloads(&self, share_id: DbId) -> Result<Option<SecureShare>, StoreError>;

    /// Flip an active share to revoked. Returns `None` if it was already
    /// revoked (or does not exist); never reactivates a share.
    async fn revoke(
        &self,
        share_id: DbId,
        revoked_by: DbId,
        reason: Option<&str>,
        at: Timestamp,
    ) -> Result<Option<SecureShare>, StoreError>;

    async fn append_access_log(
        &self,
        entry: NewAccessLogEntry,
    ) -> Result<ShareAccessLogEntry, StoreError>;

    /// Access log entries newest first.
    async fn list_access_log(
        &self,
        share_id: DbId,
        limit: usize,
    ) -> Result<Vec<ShareAccessLogEntry>, StoreError>;
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// Append-only audit storage. There is deliberately no update or delete.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_event(&self, event: NewAuditEvent) -> Result<AuditEvent, StoreError>;

    /// Matching events newest first (ties by insertion sequence), at most
    /// `limit` when given.
    async fn query_events(
        &self,
        document_id: DbId,
        filter: &AuditFilter,
        limit: Option<usize>,
    ) -> Result<Vec<AuditEvent>, StoreError>;
}

// ---------------------------------------------------------------------------
// Diff cache
// ---------------------------------------------------------------------------

/// Write-once cache of comparison results.
#[async_trait]
pub trait DiffCache: Send + Sync {
    async fn get(&self, key: &DiffKey) -> Result<Option<VersionDiffResult>, StoreError>;

    /// Insert if absent. A concurrent duplicate insert is not an error.
    async fn put(&self, key: &DiffKey, result: &VersionDiffResult) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Maps actor ids to display names for attribution.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn display_name(&self, actor_id: DbId) -> Result<Option<String>, StoreError>;
}

/// Resolver that knows nobody.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousResolver;

#[async_trait]
impl IdentityResolver for AnonymousResolver {
    async fn display_name(&self, _actor_id: DbId) -> Result<Option<String>, StoreError> {
        Ok(None)
    }
}
