//! Broadcast bus for engine notifications.
//!
//! Every [`Notification`] the engine emits is wrapped in a [`DomainEvent`]
//! stamped with a bus-wide sequence number, then fanned out over a
//! `tokio::sync::broadcast` channel. Consumers either take the raw
//! receiver or a [`DocumentSubscription`] scoped to one document.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use lexledger_core::notify::Notification;
use lexledger_core::types::DbId;
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// Which engine notification an event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    #[serde(rename = "share.created")]
    ShareCreated,
    #[serde(rename = "share.revoked")]
    ShareRevoked,
    #[serde(rename = "version.created")]
    VersionCreated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShareCreated => "share.created",
            Self::ShareRevoked => "share.revoked",
            Self::VersionCreated => "version.created",
        }
    }

    pub fn is_share_event(&self) -> bool {
        matches!(self, Self::ShareCreated | Self::ShareRevoked)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DomainEvent
// ---------------------------------------------------------------------------

/// A published notification with the routing fields lifted out of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainEvent {
    /// Position in the bus's publish order, starting at 1.
    pub sequence: u64,
    pub kind: EventKind,
    pub document_id: DbId,
    /// Set for share events.
    pub share_id: Option<DbId>,
    pub actor_id: DbId,
    pub notification: Notification,
    pub published_at: DateTime<Utc>,
}

impl DomainEvent {
    /// Envelope a notification. The sequence is assigned by
    /// [`EventBus::publish`].
    pub fn from_notification(notification: Notification, published_at: DateTime<Utc>) -> Self {
        let (kind, share_id, actor_id) = match &notification {
            Notification::ShareCreated {
                share_id, created_by, ..
            } => (EventKind::ShareCreated, Some(*share_id), *created_by),
            Notification::ShareRevoked {
                share_id, revoked_by, ..
            } => (EventKind::ShareRevoked, Some(*share_id), *revoked_by),
            Notification::VersionCreated { created_by, .. } => (EventKind::VersionCreated, None, *created_by),
        };
        Self {
            sequence: 0,
            kind,
            document_id: notification.document_id(),
            share_id,
            actor_id,
            notification,
            published_at,
        }
    }

    /// JSON body for outbound delivery.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out bus shared as `Arc<EventBus>` between the engine hook and its
/// consumers.
///
/// ```rust
/// use chrono::Utc;
/// use lexledger_core::notify::Notification;
/// use lexledger_events::bus::{DomainEvent, EventBus};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// let created = Notification::VersionCreated { document_id: 1, version_number: 1, created_by: 7 };
/// assert_eq!(bus.publish(DomainEvent::from_notification(created, Utc::now())), 1);
/// ```
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
    sequence: AtomicU64,
}

impl EventBus {
    /// When the buffer is full the oldest unread events are dropped and
    /// slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Stamp the next sequence number and publish. Returns the sequence.
    ///
    /// With no subscribers the event is dropped but still consumes a number,
    /// so consumers can spot what they missed.
    pub fn publish(&self, mut event: DomainEvent) -> u64 {
        event.sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let sequence = event.sequence;
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
        sequence
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Receive only events about `document_id`.
    pub fn subscribe_document(&self, document_id: DbId) -> DocumentSubscription {
        DocumentSubscription {
            document_id,
            receiver: self.sender.subscribe(),
        }
    }

    /// Sequence number of the most recent publish, 0 before the first.
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// DocumentSubscription
// ---------------------------------------------------------------------------

/// A receiver filtered to one document's events.
pub struct DocumentSubscription {
    document_id: DbId,
    receiver: broadcast::Receiver<DomainEvent>,
}

impl DocumentSubscription {
    /// Next event for the document, or `None` once the bus is gone.
    /// Lag is logged and skipped.
    pub async fn next(&mut self) -> Option<DomainEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.document_id == self.document_id => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        document_id = self.document_id,
                        skipped = n,
                        "Document subscription lagged"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn revoked(share_id: DbId, document_id: DbId) -> DomainEvent {
        DomainEvent::from_notification(
            Notification::ShareRevoked {
                share_id,
                document_id,
                revoked_by: 9,
                reason: Some("matter closed".into()),
            },
            Utc::now(),
        )
    }

    #[test]
    fn envelope_lifts_routing_fields() {
        let event = revoked(11, 5);
        assert_eq!(event.kind, EventKind::ShareRevoked);
        assert!(event.kind.is_share_event());
        assert_eq!(event.document_id, 5);
        assert_eq!(event.share_id, Some(11));
        assert_eq!(event.actor_id, 9);

        let json = event.to_json().unwrap();
        assert_eq!(json["kind"], "share.revoked");
        assert_eq!(json["notification"]["reason"], "matter closed");
    }

    #[tokio::test]
    async fn publish_assigns_increasing_sequences() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        assert_eq!(bus.publish(revoked(1, 5)), 1);
        assert_eq!(bus.publish(revoked(2, 5)), 2);
        assert_eq!(bus.last_sequence(), 2);

        assert_eq!(rx.recv().await.unwrap().sequence, 1);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.sequence, 2);
        assert_eq!(second.share_id, Some(2));
    }

    #[test]
    fn publish_without_subscribers_still_counts() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(revoked(1, 5)), 1);
        assert_eq!(bus.last_sequence(), 1);
    }

    #[tokio::test]
    async fn document_subscription_filters_and_ends_with_the_bus() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe_document(5);

        bus.publish(revoked(1, 4));
        bus.publish(revoked(2, 5));
        drop(bus);

        let event = sub.next().await.unwrap();
        assert_eq!(event.share_id, Some(2));
        assert!(sub.next().await.is_none());
    }
}
