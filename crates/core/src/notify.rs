//! Outbound domain notifications.
//!
//! The engine announces share lifecycle changes through an [`EventHook`];
//! delivery (email, webhooks, UI push) belongs to whoever subscribes.

use serde::Serialize;

use crate::types::{DbId, Timestamp};

/// A domain notification emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Notification {
    #[serde(rename = "share.created")]
    ShareCreated {
        share_id: DbId,
        document_id: DbId,
        created_by: DbId,
        expires_at: Option<Timestamp>,
    },

    #[serde(rename = "share.revoked")]
    ShareRevoked {
        share_id: DbId,
        document_id: DbId,
        revoked_by: DbId,
        reason: Option<String>,
    },

    #[serde(rename = "version.created")]
    VersionCreated {
        document_id: DbId,
        version_number: i32,
        created_by: DbId,
    },
}

impl Notification {
    /// Dot-separated event name, matching the serde tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ShareCreated { .. } => "share.created",
            Self::ShareRevoked { .. } => "share.revoked",
            Self::VersionCreated { .. } => "version.created",
        }
    }

    pub fn document_id(&self) -> DbId {
        match self {
            Self::ShareCreated { document_id, .. }
            | Self::ShareRevoked { document_id, .. }
            | Self::VersionCreated { document_id, .. } => *document_id,
        }
    }
}

/// Receives notifications. Must not block; implementations hand off.
pub trait EventHook: Send + Sync {
    fn emit(&self, notification: Notification);
}

/// Hook that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventHook;

impl EventHook for NoopEventHook {
    fn emit(&self, _notification: Notification) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_dotted_type_tag() {
        let n = Notification::ShareRevoked {
            share_id: 1,
            document_id: 2,
            revoked_by: 3,
            reason: Some("matter closed".into()),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "share.revoked");
        assert_eq!(json["document_id"], 2);
        assert_eq!(n.event_type(), "share.revoked");
    }
}
