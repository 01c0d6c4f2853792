//! Background delivery of bus events.
//!
//! [`EventRelay`] subscribes to the bus and hands every event to an
//! [`EventSink`]. It runs as a long-lived task and stops when the bus is
//! dropped.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::bus::DomainEvent;

/// Why a sink could not take an event.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("destination unavailable: {0}")]
    Unavailable(String),

    #[error("destination rejected event: {0}")]
    Rejected(String),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for relayed events (webhooks, mail, a message queue).
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event. Failures are logged by the relay and skipped.
    async fn deliver(&self, event: &DomainEvent) -> Result<(), DeliveryError>;
}

/// Outcome of a relay run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayReport {
    pub delivered: u64,
    pub failed: u64,
    /// Events dropped because the relay fell behind the bus.
    pub lagged: u64,
}

pub struct EventRelay;

impl EventRelay {
    /// Drain `receiver` into `sink` until the channel closes.
    pub async fn run<S: EventSink + ?Sized>(
        sink: &S,
        mut receiver: broadcast::Receiver<DomainEvent>,
    ) -> RelayReport {
        let mut report = RelayReport::default();
        loop {
            match receiver.recv().await {
                Ok(event) => match sink.deliver(&event).await {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        report.failed += 1;
                        tracing::error!(
                            error = %e,
                            kind = %event.kind,
                            sequence = event.sequence,
                            document_id = event.document_id,
                            "Failed to deliver event"
                        );
                    }
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    report.lagged += n;
                    tracing::warn!(skipped = n, "Event relay lagged, some events were not delivered");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!(
                        delivered = report.delivered,
                        failed = report.failed,
                        "Event bus closed, relay shutting down"
                    );
                    break;
                }
            }
        }
        report
    }
}
