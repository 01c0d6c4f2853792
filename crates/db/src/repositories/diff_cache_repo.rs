//! Repository for the write-once `version_diff_cache` table.

use lexledger_core::diff::{DiffKey, VersionDiffResult};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::diff_cache::DiffCacheRow;

const COLUMNS: &str = "document_id, from_version, to_version, result, created_at";

pub struct DiffCacheRepo;

impl DiffCacheRepo {
    pub async fn find(pool: &PgPool, key: &DiffKey) -> Result<Option<DiffCacheRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM version_diff_cache \
             WHERE document_id = $1 AND from_version = $2 AND to_version = $3"
        );
        sqlx::query_as::<_, DiffCacheRow>(&query)
            .bind(key.document_id)
            .bind(key.from_version)
            .bind(key.to_version)
            .fetch_optional(pool)
            .await
    }

    /// Insert unless a result for the key already exists.
    pub async fn insert_if_absent(
        pool: &PgPool,
        key: &DiffKey,
        result: &VersionDiffResult,
    ) -> Result<bool, sqlx::Error> {
        let inserted = sqlx::query(
            "INSERT INTO version_diff_cache (document_id, from_version, to_version, result) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT DO NOTHING",
        )
        .bind(key.document_id)
        .bind(key.from_version)
        .bind(key.to_version)
        .bind(Json(result))
        .execute(pool)
        .await?
        .rows_affected();
        Ok(inserted > 0)
    }
}
