//! Audit event types, redaction and trail summaries.
//!
//! Audit events are append-only compliance records: nothing in this crate
//! updates or deletes one. The service that writes and reads them lives in
//! [`crate::audit_trail`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Maximum description length in characters.
pub const MAX_DESCRIPTION_LEN: usize = 2_000;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// What happened to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Created,
    Updated,
    Viewed,
    Downloaded,
    Shared,
    ShareRevoked,
    VersionCreated,
    VersionRestored,
    CorrectionApplied,
    Compared,
    Deleted,
    Other,
}

impl AuditEventType {
    pub const ALL: [AuditEventType; 12] = [
        Self::Created,
        Self::Updated,
        Self::Viewed,
        Self::Downloaded,
        Self::Shared,
        Self::ShareRevoked,
        Self::VersionCreated,
        Self::VersionRestored,
        Self::CorrectionApplied,
        Self::Compared,
        Self::Deleted,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Viewed => "viewed",
            Self::Downloaded => "downloaded",
            Self::Shared => "shared",
            Self::ShareRevoked => "share_revoked",
            Self::VersionCreated => "version_created",
            Self::VersionRestored => "version_restored",
            Self::CorrectionApplied => "correction_applied",
            Self::Compared => "compared",
            Self::Deleted => "deleted",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEventType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown audit event type '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A stored audit event. `id` doubles as the insertion sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: DbId,
    pub document_id: DbId,
    pub event_type: AuditEventType,
    pub description: String,
    pub actor_id: Option<DbId>,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub field_changes: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}

/// An event to append.
///
/// Constructed via [`NewAuditEvent::new`] and enriched with the builder
/// methods, mirroring how domain notifications are assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEvent {
    pub document_id: DbId,
    pub event_type: AuditEventType,
    pub description: String,
    pub actor_id: Option<DbId>,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub field_changes: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
    /// Filled in by the audit service from its clock.
    pub created_at: Option<Timestamp>,
}

impl NewAuditEvent {
    pub fn new(document_id: DbId, event_type: AuditEventType, description: impl Into<String>) -> Self {
        Self {
            document_id,
            event_type,
            description: description.into(),
            actor_id: None,
            before: None,
            after: None,
            field_changes: None,
            metadata: serde_json::Value::Object(Default::default()),
            created_at: None,
        }
    }

    pub fn with_actor(mut self, actor_id: DbId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_snapshots(
        mut self,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        self.before = before;
        self.after = after;
        self
    }

    pub fn with_field_changes(mut self, changes: serde_json::Value) -> Self {
        self.field_changes = Some(changes);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.description.trim().is_empty() {
            return Err(CoreError::Validation(
                "Audit description must not be empty".into(),
            ));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(CoreError::Validation(format!(
                "Audit description must be at most {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        Ok(())
    }

    /// Apply [`redact_sensitive_fields`] to every free-form JSON payload.
    pub fn redacted(mut self) -> Self {
        self.before = self.before.as_ref().map(redact_sensitive_fields);
        self.after = self.after.as_ref().map(redact_sensitive_fields);
        self.field_changes = self.field_changes.as_ref().map(redact_sensitive_fields);
        self.metadata = redact_sensitive_fields(&self.metadata);
        self
    }
}

/// Filter for [`crate::store::AuditStore::query_events`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub event_type: Option<AuditEventType>,
    pub actor_id: Option<DbId>,
    pub since: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Sensitive field redaction
// ---------------------------------------------------------------------------

/// Keys whose values never reach the audit table.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "token",
    "secret",
    "access_code",
    "api_key",
    "private_key",
    "authorization",
    "credential",
];

/// Replace the value of any key containing a [`SENSITIVE_FIELDS`] entry
/// with `"[REDACTED]"`, recursing into objects and arrays.
pub fn redact_sensitive_fields(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, val) in map {
                let lower_key = key.to_lowercase();
                if SENSITIVE_FIELDS.iter().any(|f| lower_key.contains(f)) {
                    redacted.insert(
                        key.clone(),
                        serde_json::Value::String("[REDACTED]".to_string()),
                    );
                } else {
                    redacted.insert(key.clone(), redact_sensitive_fields(val));
                }
            }
            serde_json::Value::Object(redacted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(redact_sensitive_fields).collect())
        }
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Ordering and summary
// ---------------------------------------------------------------------------

/// Sort newest first; ties on timestamp fall back to insertion sequence.
pub fn sort_newest_first(events: &mut [AuditEvent]) {
    events.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// Aggregate view over a set of audit events.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditSummary {
    pub total_events: usize,
    pub by_event_type: BTreeMap<String, usize>,
    /// Keyed by actor id; system events (no actor) are under `"system"`.
    pub by_actor: BTreeMap<String, usize>,
    pub first_event_at: Option<Timestamp>,
    pub last_event_at: Option<Timestamp>,
    pub total_views: usize,
    pub total_downloads: usize,
    pub total_shares: usize,
    pub total_corrections: usize,
}

impl AuditSummary {
    pub fn from_events(events: &[AuditEvent]) -> Self {
        let mut summary = Self {
            total_events: events.len(),
            ..Self::default()
        };

        for event in events {
            *summary
                .by_event_type
                .entry(event.event_type.as_str().to_string())
                .or_default() += 1;

            let actor = event
                .actor_id
                .map_or_else(|| "system".to_string(), |id| id.to_string());
            *summary.by_actor.entry(actor).or_default() += 1;

            summary.first_event_at = Some(match summary.first_event_at {
                Some(first) => first.min(event.created_at),
                None => event.created_at,
            });
            summary.last_event_at = Some(match summary.last_event_at {
                Some(last) => last.max(event.created_at),
                None => event.created_at,
            });

            match event.event_type {
                AuditEventType::Viewed => summary.total_views += 1,
                AuditEventType::Downloaded => summary.total_downloads += 1,
                AuditEventType::Shared => summary.total_shares += 1,
                AuditEventType::CorrectionApplied => summary.total_corrections += 1,
                _ => {}
            }
        }
        summary
    }
}

/// Events plus their summary, as returned by the audit trail service.
#[derive(Debug, Clone, Serialize)]
pub struct AuditTrail {
    pub document_id: DbId,
    pub events: Vec<AuditEvent>,
    pub summary: AuditSummary,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
