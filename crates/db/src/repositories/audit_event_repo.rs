//! Repository for the `audit_events` table.
//!
//! Insert and select only. The table's trigger rejects UPDATE and DELETE.

use lexledger_core::audit::{AuditFilter, NewAuditEvent};
use lexledger_core::types::DbId;
use sqlx::PgPool;

use crate::models::audit_event::AuditEventRow;

/// Column list for `audit_events` queries.
const COLUMNS: &str = "\
    id, document_id, event_type, description, actor_id, before_state, \
    after_state, field_changes, metadata, created_at";

pub struct AuditEventRepo;

impl AuditEventRepo {
    /// Append an event. A missing `created_at` defaults to the database clock.
    pub async fn create(pool: &PgPool, event: &NewAuditEvent) -> Result<AuditEventRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO audit_events \
                (document_id, event_type, description, actor_id, before_state, \
                 after_state, field_changes, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9::timestamptz, now())) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditEventRow>(&query)
            .bind(event.document_id)
            .bind(event.event_type.as_str())
            .bind(&event.description)
            .bind(event.actor_id)
            .bind(&event.before)
            .bind(&event.after)
            .bind(&event.field_changes)
            .bind(&event.metadata)
            .bind(event.created_at)
            .fetch_one(pool)
            .await
    }

    /// Matching events newest first. Unset filter fields match everything.
    pub async fn query(
        pool: &PgPool,
        document_id: DbId,
        filter: &AuditFilter,
        limit: Option<i64>,
    ) -> Result<Vec<AuditEventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM audit_events \
             WHERE document_id = $1 \
               AND ($2::text IS NULL OR event_type = $2) \
               AND ($3::bigint IS NULL OR actor_id = $3) \
               AND ($4::timestamptz IS NULL OR created_at >= $4) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5"
        );
        sqlx::query_as::<_, AuditEventRow>(&query)
            .bind(document_id)
            .bind(filter.event_type.map(|t| t.as_str()))
            .bind(filter.actor_id)
            .bind(filter.since)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    pub async fn count_for_document(pool: &PgPool, document_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*)::BIGINT FROM audit_events WHERE document_id = $1")
            .bind(document_id)
            .fetch_one(pool)
            .await
    }
}
