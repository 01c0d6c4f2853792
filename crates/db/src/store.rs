//! [`PgStore`]: the PostgreSQL implementation of the engine's store traits.

use async_trait::async_trait;
use lexledger_core::audit::{AuditEvent, AuditFilter, NewAuditEvent};
use lexledger_core::diff::{DiffKey, VersionDiffResult};
use lexledger_core::document::{Document, DocumentVersion, VersionSnapshot};
use lexledger_core::share::{NewAccessLogEntry, NewShare, SecureShare, ShareAccessLogEntry};
use lexledger_core::store::{AuditStore, DiffCache, ShareStore, StoreError, VersionStore};
use lexledger_core::types::{DbId, Timestamp, VersionNumber};

use crate::error::into_store_error;
use crate::models::secure_share::SecureShareRow;
use crate::repositories::{
    AuditEventRepo, DiffCacheRepo, DocumentRepo, DocumentVersionRepo, SecureShareRepo,
    ShareAccessLogRepo,
};
use crate::DbPool;

/// Store backed by a shared connection pool. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Create an empty document owned by `organization_id`.
    pub async fn create_document(
        &self,
        organization_id: DbId,
        title: &str,
    ) -> Result<Document, StoreError> {
        DocumentRepo::create(&self.pool, organization_id, title)
            .await
            .map(Document::from)
            .map_err(into_store_error)
    }
}

fn to_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn share_from_row(row: Option<SecureShareRow>) -> Result<Option<SecureShare>, StoreError> {
    row.map(SecureShare::try_from)
        .transpose()
        .map_err(StoreError::from)
}

fn shares_from_rows(rows: Vec<SecureShareRow>) -> Result<Vec<SecureShare>, StoreError> {
    rows.into_iter()
        .map(|row| SecureShare::try_from(row).map_err(StoreError::from))
        .collect()
}

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

#[async_trait]
impl VersionStore for PgStore {
    async fn load_document(&self, document_id: DbId) -> Result<Option<Document>, StoreError> {
        let row = DocumentRepo::find_by_id(&self.pool, document_id)
            .await
            .map_err(into_store_error)?;
        Ok(row.map(Document::from))
    }

    async fn list_documents(&self, organization_id: DbId) -> Result<Vec<Document>, StoreError> {
        let rows = DocumentRepo::list_by_organization(&self.pool, organization_id)
            .await
            .map_err(into_store_error)?;
        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn load_version(
        &self,
        document_id: DbId,
        version_number: VersionNumber,
    ) -> Result<Option<DocumentVersion>, StoreError> {
        let row = DocumentVersionRepo::find(&self.pool, document_id, version_number)
            .await
            .map_err(into_store_error)?;
        Ok(row.map(DocumentVersion::from))
    }

    async fn list_versions(
        &self,
        document_id: DbId,
        limit: Option<usize>,
    ) -> Result<Vec<DocumentVersion>, StoreError> {
        let rows = DocumentVersionRepo::list_by_document(&self.pool, document_id, limit.map(to_limit))
            .await
            .map_err(into_store_error)?;
        Ok(rows.into_iter().map(DocumentVersion::from).collect())
    }

    async fn append_version(&self, snapshot: VersionSnapshot) -> Result<DocumentVersion, StoreError> {
        match DocumentVersionRepo::append(&self.pool, &snapshot)
            .await
            .map_err(into_store_error)?
        {
            Some(row) => Ok(row.into()),
            None => {
                let exists = DocumentRepo::find_by_id(&self.pool, snapshot.document_id)
                    .await
                    .map_err(into_store_error)?
                    .is_some();
                if exists {
                    Err(StoreError::Conflict(format!(
                        "version {} of document {} is not the next version",
                        snapshot.version_number, snapshot.document_id
                    )))
                } else {
                    Err(StoreError::Backend(format!(
                        "document {} does not exist",
                        snapshot.document_id
                    )))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Shares
// ---------------------------------------------------------------------------

#[async_trait]
impl ShareStore for PgStore {
    async fn load_share(&self, slug: &str) -> Result<Option<SecureShare>, StoreError> {
        let row = SecureShareRepo::find_by_slug(&self.pool, slug)
            .await
            .map_err(into_store_error)?;
        share_from_row(row)
    }

    async fn load_share_by_id(&self, share_id: DbId) -> Result<Option<SecureShare>, StoreError> {
        let row = SecureShareRepo::find_by_id(&self.pool, share_id)
            .await
            .map_err(into_store_error)?;
        share_from_row(row)
    }

    async fn save_share(&self, share: NewShare) -> Result<SecureShare, StoreError> {
        let row = SecureShareRepo::create(&self.pool, &share)
            .await
            .map_err(into_store_error)?;
        Ok(SecureShare::try_from(row)?)
    }

    async fn list_shares_for_document(&self, document_id: DbId) -> Result<Vec<SecureShare>, StoreError> {
        let rows = SecureShareRepo::list_by_document(&self.pool, document_id)
            .await
            .map_err(into_store_error)?;
        shares_from_rows(rows)
    }

    async fn list_shares_for_organization(
        &self,
        organization_id: DbId,
    ) -> Result<Vec<SecureShare>, StoreError> {
        let rows = SecureShareRepo::list_by_organization(&self.pool, organization_id)
            .await
            .map_err(into_store_error)?;
        shares_from_rows(rows)
    }

    async fn try_increment_views(&self, share_id: DbId) -> Result<Option<SecureShare>, StoreError> {
        let row = SecureShareRepo::increment_views(&self.pool, share_id)
            .await
            .map_err(into_store_error)?;
        share_from_row(row)
    }

    async fn try_increment_downloads(&self, share_id: DbId) -> Result<Option<SecureShare>, StoreError> {
        let row = SecureShareRepo::increment_downloads(&self.pool, share_id)
            .await
            .map_err(into_store_error)?;
        share_from_row(row)
    }

    async fn revoke(
        &self,
        share_id: DbId,
        revoked_by: DbId,
        reason: Option<&str>,
        at: Timestamp,
    ) -> Result<Option<SecureShare>, StoreError> {
        let row = SecureShareRepo::revoke(&self.pool, share_id, revoked_by, reason, at)
            .await
            .map_err(into_store_error)?;
        share_from_row(row)
    }

    async fn append_access_log(
        &self,
        entry: NewAccessLogEntry,
    ) -> Result<ShareAccessLogEntry, StoreError> {
        let row = ShareAccessLogRepo::create(&self.pool, &entry)
            .await
            .map_err(into_store_error)?;
        Ok(ShareAccessLogEntry::try_from(row)?)
    }

    async fn list_access_log(
        &self,
        share_id: DbId,
        limit: usize,
    ) -> Result<Vec<ShareAccessLogEntry>, StoreError> {
        let rows = ShareAccessLogRepo::list_by_share(&self.pool, share_id, to_limit(limit))
            .await
            .map_err(into_store_error)?;
        rows.into_iter()
            .map(|row| ShareAccessLogEntry::try_from(row).map_err(StoreError::from))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

#[async_trait]
impl AuditStore for PgStore {
    async fn append_event(&self, event: NewAuditEvent) -> Result<AuditEvent, StoreError> {
        let row = AuditEventRepo::create(&self.pool, &event)
            .await
            .map_err(into_store_error)?;
        Ok(AuditEvent::try_from(row)?)
    }

    async fn query_events(
        &self,
        document_id: DbId,
        filter: &AuditFilter,
        limit: Option<usize>,
    ) -> Result<Vec<AuditEvent>, StoreError> {
        let rows = AuditEventRepo::query(&self.pool, document_id, filter, limit.map(to_limit))
            .await
            .map_err(into_store_error)?;
        rows.into_iter()
            .map(|row| AuditEvent::try_from(row).map_err(StoreError::from))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Diff cache
// ---------------------------------------------------------------------------

#[async_trait]
impl DiffCache for PgStore {
    async fn get(&self, key: &DiffKey) -> Result<Option<VersionDiffResult>, StoreError> {
        let row = DiffCacheRepo::find(&self.pool, key)
            .await
            .map_err(into_store_error)?;
        Ok(row.map(|r| r.result.0))
    }

    async fn put(&self, key: &DiffKey, result: &VersionDiffResult) -> Result<(), StoreError> {
        let inserted = DiffCacheRepo::insert_if_absent(&self.pool, key, result)
            .await
            .map_err(into_store_error)?;
        if !inserted {
            tracing::debug!(key = %key, "Diff already cached");
        }
        Ok(())
    }
}
