//! `audit_events` rows. No `updated_at`; rows are append-only.

use lexledger_core::audit::{AuditEvent, AuditEventType};
use lexledger_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use crate::error::UnexpectedValue;

#[derive(Debug, Clone, FromRow)]
pub struct AuditEventRow {
    pub id: DbId,
    pub document_id: DbId,
    pub event_type: String,
    pub description: String,
    pub actor_id: Option<DbId>,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub field_changes: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}

impl TryFrom<AuditEventRow> for AuditEvent {
    type Error = UnexpectedValue;

    fn try_from(row: AuditEventRow) -> Result<Self, Self::Error> {
        let event_type: AuditEventType = row
            .event_type
            .parse()
            .map_err(|_| UnexpectedValue::new("event_type", &row.event_type))?;

        Ok(Self {
            id: row.id,
            document_id: row.document_id,
            event_type,
            description: row.description,
            actor_id: row.actor_id,
            before: row.before_state,
            after: row.after_state,
            field_changes: row.field_changes,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}
