//! Event fan-out for the lexledger engine.
//!
//! - [`EventBus`] is the in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`DomainEvent`] wraps each engine notification with its kind,
//!   document, share and a bus sequence number.
//! - [`BusEventHook`] plugs the bus into the engine as its event hook.
//! - [`EventRelay`] drains a subscription into an [`EventSink`] such as a
//!   webhook or email dispatcher.

pub mod bus;
pub mod hook;
pub mod relay;

pub use bus::{DocumentSubscription, DomainEvent, EventBus, EventKind};
pub use hook::BusEventHook;
pub use relay::{DeliveryError, EventRelay, EventSink, RelayReport};
