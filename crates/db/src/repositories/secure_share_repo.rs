//! Repository for the `secure_shares` and `share_access_logs` tables.
//!
//! Counter updates are single conditional statements: the increment only
//! happens when the share is still active and under its limit, so
//! concurrent requests can never overshoot.

use lexledger_core::share::{NewAccessLogEntry, NewShare};
use lexledger_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::secure_share::{SecureShareRow, ShareAccessLogRow};

/// Column list for `secure_shares` queries.
const COLUMNS: &str = "\
    id, document_id, organization_id, slug, access_code_hash, permission, \
    valid_from, expires_at, allowed_views, view_count, allowed_downloads, \
    download_count, allowed_ips, requires_authentication, is_active, \
    revoked_at, revoked_by, revocation_reason, created_by, created_at";

/// Column list for `share_access_logs` queries.
const LOG_COLUMNS: &str = "\
    id, share_id, access_type, requester_ip, requester_identity, \
    success, failure_reason, created_at";

// ---------------------------------------------------------------------------
// SecureShareRepo
// ---------------------------------------------------------------------------

pub struct SecureShareRepo;

impl SecureShareRepo {
    /// Insert a share. A duplicate slug fails with a unique violation.
    pub async fn create(pool: &PgPool, share: &NewShare) -> Result<SecureShareRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO secure_shares \
                (document_id, organization_id, slug, access_code_hash, permission, \
                 valid_from, expires_at, allowed_views, allowed_downloads, allowed_ips, \
                 requires_authentication, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SecureShareRow>(&query)
            .bind(share.document_id)
            .bind(share.organization_id)
            .bind(&share.slug)
            .bind(&share.access_code_hash)
            .bind(share.permission.as_str())
            .bind(share.valid_from)
            .bind(share.expires_at)
            .bind(share.allowed_views)
            .bind(share.allowed_downloads)
            .bind(&share.allowed_ips)
            .bind(share.requires_authentication)
            .bind(share.created_by)
            .bind(share.created_at)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<SecureShareRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM secure_shares WHERE slug = $1");
        sqlx::query_as::<_, SecureShareRow>(&query)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SecureShareRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM secure_shares WHERE id = $1");
        sqlx::query_as::<_, SecureShareRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_document(
        pool: &PgPool,
        document_id: DbId,
    ) -> Result<Vec<SecureShareRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM secure_shares WHERE document_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, SecureShareRow>(&query)
            .bind(document_id)
            .fetch_all(pool)
            .await
    }

    pub async fn list_by_organization(
        pool: &PgPool,
        organization_id: DbId,
    ) -> Result<Vec<SecureShareRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM secure_shares WHERE organization_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, SecureShareRow>(&query)
            .bind(organization_id)
            .fetch_all(pool)
            .await
    }

    /// Consume one view if the share is active and under its view limit.
    pub async fn increment_views(pool: &PgPool, id: DbId) -> Result<Option<SecureShareRow>, sqlx::Error> {
        let query = format!(
            "UPDATE secure_shares SET view_count = view_count + 1 \
             WHERE id = $1 AND is_active = true \
               AND (allowed_views = -1 OR view_count < allowed_views) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SecureShareRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Consume one download if the share is active and under its download limit.
    pub async fn increment_downloads(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<SecureShareRow>, sqlx::Error> {
        let query = format!(
            "UPDATE secure_shares SET download_count = download_count + 1 \
             WHERE id = $1 AND is_active = true \
               AND (allowed_downloads = -1 OR download_count < allowed_downloads) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SecureShareRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Deactivate an active share. Returns `None` if already revoked.
    pub async fn revoke(
        pool: &PgPool,
        id: DbId,
        revoked_by: DbId,
        reason: Option<&str>,
        at: Timestamp,
    ) -> Result<Option<SecureShareRow>, sqlx::Error> {
        let query = format!(
            "UPDATE secure_shares \
             SET is_active = false, revoked_at = $2, revoked_by = $3, revocation_reason = $4 \
             WHERE id = $1 AND is_active = true \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SecureShareRow>(&query)
            .bind(id)
            .bind(at)
            .bind(revoked_by)
            .bind(reason)
            .fetch_optional(pool)
            .await
    }
}

// ---------------------------------------------------------------------------
// ShareAccessLogRepo
// ---------------------------------------------------------------------------

pub struct ShareAccessLogRepo;

impl ShareAccessLogRepo {
    pub async fn create(
        pool: &PgPool,
        entry: &NewAccessLogEntry,
    ) -> Result<ShareAccessLogRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO share_access_logs \
                (share_id, access_type, requester_ip, requester_identity, \
                 success, failure_reason, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {LOG_COLUMNS}"
        );
        sqlx::query_as::<_, ShareAccessLogRow>(&query)
            .bind(entry.share_id)
            .bind(entry.access_type.as_str())
            .bind(&entry.requester_ip)
            .bind(&entry.requester_identity)
            .bind(entry.success)
            .bind(&entry.failure_reason)
            .bind(entry.created_at)
            .fetch_one(pool)
            .await
    }

    /// Entries newest first; ties on timestamp fall back to id.
    pub async fn list_by_share(
        pool: &PgPool,
        share_id: DbId,
        limit: i64,
    ) -> Result<Vec<ShareAccessLogRow>, sqlx::Error> {
        let query = format!(
            "SELECT {LOG_COLUMNS} FROM share_access_logs \
             WHERE share_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, ShareAccessLogRow>(&query)
            .bind(share_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
