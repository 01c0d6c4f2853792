//! `version_diff_cache` rows.

use lexledger_core::diff::VersionDiffResult;
use lexledger_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct DiffCacheRow {
    pub document_id: DbId,
    pub from_version: i32,
    pub to_version: i32,
    pub result: Json<VersionDiffResult>,
    pub created_at: Timestamp,
}
