//! Repository for the `documents` and `document_versions` tables.
//!
//! Versions are immutable snapshots. Appending one advances the parent
//! document's `current_version` in the same transaction.

use lexledger_core::document::VersionSnapshot;
use lexledger_core::types::{DbId, VersionNumber};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::document::{DocumentRow, DocumentVersionRow};

/// Column list for `documents` queries.
const DOCUMENT_COLUMNS: &str = "id, organization_id, title, current_version, created_at";

/// Column list for `document_versions` queries.
const VERSION_COLUMNS: &str = "\
    id, document_id, version_number, title, content, metadata, \
    quality_score, change_summary, created_by, created_at";

// ---------------------------------------------------------------------------
// DocumentRepo
// ---------------------------------------------------------------------------

pub struct DocumentRepo;

impl DocumentRepo {
    /// Insert a document with no versions.
    pub async fn create(
        pool: &PgPool,
        organization_id: DbId,
        title: &str,
    ) -> Result<DocumentRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO documents (organization_id, title) VALUES ($1, $2) \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        sqlx::query_as::<_, DocumentRow>(&query)
            .bind(organization_id)
            .bind(title)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<DocumentRow>, sqlx::Error> {
        let query = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1");
        sqlx::query_as::<_, DocumentRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_organization(
        pool: &PgPool,
        organization_id: DbId,
    ) -> Result<Vec<DocumentRow>, sqlx::Error> {
        let query = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE organization_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, DocumentRow>(&query)
            .bind(organization_id)
            .fetch_all(pool)
            .await
    }
}

// ---------------------------------------------------------------------------
// DocumentVersionRepo
// ---------------------------------------------------------------------------

pub struct DocumentVersionRepo;

impl DocumentVersionRepo {
    pub async fn find(
        pool: &PgPool,
        document_id: DbId,
        version_number: VersionNumber,
    ) -> Result<Option<DocumentVersionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {VERSION_COLUMNS} FROM document_versions \
             WHERE document_id = $1 AND version_number = $2"
        );
        sqlx::query_as::<_, DocumentVersionRow>(&query)
            .bind(document_id)
            .bind(version_number)
            .fetch_optional(pool)
            .await
    }

    /// Versions newest first. A `None` limit returns them all.
    pub async fn list_by_document(
        pool: &PgPool,
        document_id: DbId,
        limit: Option<i64>,
    ) -> Result<Vec<DocumentVersionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {VERSION_COLUMNS} FROM document_versions \
             WHERE document_id = $1 \
             ORDER BY version_number DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, DocumentVersionRow>(&query)
            .bind(document_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Append a snapshot if its number is exactly `current_version + 1`.
    ///
    /// Returns `None` when the document has moved on (or does not exist).
    /// Two concurrent appends of the same number serialize on the document
    /// row; the loser sees zero rows updated.
    pub async fn append(
        pool: &PgPool,
        snapshot: &VersionSnapshot,
    ) -> Result<Option<DocumentVersionRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let advanced = sqlx::query(
            "UPDATE documents SET current_version = $2, title = $3 \
             WHERE id = $1 AND current_version = $2 - 1",
        )
        .bind(snapshot.document_id)
        .bind(snapshot.version_number)
        .bind(&snapshot.title)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if advanced == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let query = format!(
            "INSERT INTO document_versions \
                (document_id, version_number, title, content, metadata, \
                 quality_score, change_summary, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {VERSION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DocumentVersionRow>(&query)
            .bind(snapshot.document_id)
            .bind(snapshot.version_number)
            .bind(&snapshot.title)
            .bind(&snapshot.content)
            .bind(Json(&snapshot.metadata))
            .bind(snapshot.quality_score)
            .bind(&snapshot.change_summary)
            .bind(snapshot.created_by)
            .bind(snapshot.created_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(row))
    }
}
