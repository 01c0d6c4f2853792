//! Append-only audit trail service.

use std::sync::Arc;

use crate::audit::{sort_newest_first, AuditEvent, AuditEventType, AuditFilter, AuditSummary, AuditTrail, NewAuditEvent};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::store::{bounded, AuditStore};
use crate::types::DbId;

/// Writes and reads the per-document audit trail.
pub struct AuditTrailService {
    store: Arc<dyn AuditStore>,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
}

impl AuditTrailService {
    pub fn new(store: Arc<dyn AuditStore>, clock: Arc<dyn Clock>, config: Arc<EngineConfig>) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Append one event. Sensitive payload keys are redacted and the
    /// timestamp is taken from the service clock when not supplied.
    pub async fn log(&self, event: NewAuditEvent) -> Result<AuditEvent, CoreError> {
        event.validate()?;

        let mut event = event.redacted();
        if event.created_at.is_none() {
            event.created_at = Some(self.clock.now());
        }

        let stored = bounded(
            self.config.store_timeout(),
            "append_event",
            self.store.append_event(event),
        )
        .await?;

        tracing::debug!(
            audit_id = stored.id,
            document_id = stored.document_id,
            event_type = %stored.event_type,
            "Audit event recorded"
        );
        Ok(stored)
    }

    /// Append an event after the action it describes has already committed.
    ///
    /// The action cannot be undone at this point, so a failed append is
    /// logged at error level instead of being returned.
    pub(crate) async fn record(&self, event: NewAuditEvent) {
        let document_id = event.document_id;
        let event_type = event.event_type;
        if let Err(e) = self.log(event).await {
            tracing::error!(
                error = %e,
                document_id,
                event_type = %event_type,
                "Failed to append audit event"
            );
        }
    }

    /// Events newest first (at most `limit`), plus a summary over every
    /// event matching the filter.
    pub async fn get_trail(
        &self,
        document_id: DbId,
        event_type: Option<AuditEventType>,
        limit: Option<usize>,
    ) -> Result<AuditTrail, CoreError> {
        let filter = AuditFilter {
            event_type,
            ..AuditFilter::default()
        };
        let mut events = bounded(
            self.config.store_timeout(),
            "query_events",
            self.store.query_events(document_id, &filter, None),
        )
        .await?;
        sort_newest_first(&mut events);

        let summary = AuditSummary::from_events(&events);
        events.truncate(self.config.clamp_limit(limit, self.config.history_default_limit));

        Ok(AuditTrail {
            document_id,
            events,
            summary,
        })
    }
}
