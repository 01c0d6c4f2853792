//! `documents` and `document_versions` rows.

use lexledger_core::document::{Document, DocumentVersion, Metadata};
use lexledger_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DocumentRow {
    pub id: DbId,
    pub organization_id: DbId,
    pub title: String,
    pub current_version: i32,
    pub created_at: Timestamp,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Self {
            id: row.id,
            organization_id: row.organization_id,
            title: row.title,
            current_version: row.current_version,
            created_at: row.created_at,
        }
    }
}

/// An immutable snapshot row. There is no `updated_at`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DocumentVersionRow {
    pub id: DbId,
    pub document_id: DbId,
    pub version_number: i32,
    pub title: String,
    pub content: String,
    pub metadata: Json<Metadata>,
    pub quality_score: Option<f64>,
    pub change_summary: Option<String>,
    pub created_by: DbId,
    pub created_at: Timestamp,
}

impl From<DocumentVersionRow> for DocumentVersion {
    fn from(row: DocumentVersionRow) -> Self {
        Self {
            id: row.id,
            document_id: row.document_id,
            version_number: row.version_number,
            title: row.title,
            content: row.content,
            metadata: row.metadata.0,
            quality_score: row.quality_score,
            change_summary: row.change_summary,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}
