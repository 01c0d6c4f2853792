//! Bridges engine notifications onto the [`EventBus`].

use std::sync::Arc;

use chrono::Utc;
use lexledger_core::notify::{EventHook, Notification};

use crate::bus::{DomainEvent, EventBus};

/// [`EventHook`] that republishes every notification on a bus.
///
/// Publishing never blocks, so the engine can call this from inside a
/// request.
#[derive(Clone)]
pub struct BusEventHook {
    bus: Arc<EventBus>,
}

impl BusEventHook {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl EventHook for BusEventHook {
    fn emit(&self, notification: Notification) {
        let event = DomainEvent::from_notification(notification, Utc::now());
        let (kind, document_id) = (event.kind, event.document_id);
        let sequence = self.bus.publish(event);
        tracing::debug!(%kind, document_id, sequence, "Published engine notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventKind;

    #[tokio::test]
    async fn notifications_are_published_in_order() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let hook = BusEventHook::new(bus.clone());

        hook.emit(Notification::VersionCreated {
            document_id: 3,
            version_number: 2,
            created_by: 4,
        });
        hook.emit(Notification::ShareCreated {
            share_id: 8,
            document_id: 3,
            created_by: 4,
            expires_at: None,
        });

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::VersionCreated);
        assert_eq!(first.share_id, None);
        assert_eq!(first.sequence, 1);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, EventKind::ShareCreated);
        assert_eq!(second.share_id, Some(8));
        assert_eq!(second.sequence, 2);
    }
}
