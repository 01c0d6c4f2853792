//! Document version lineage and secure collaboration engine.
//!
//! Pure domain logic and services. Persistence is reached only through the
//! traits in [`store`]; `lexledger-db` supplies the PostgreSQL side and
//! [`memory::InMemoryStore`] an in-process one.
//!
//! - [`diff::DiffEngine`] compares two versions field by field and line by line.
//! - [`history::VersionHistoryService`] records, restores and lists versions.
//! - [`share_manager::SecureShareManager`] issues and enforces external shares.
//! - [`audit_trail::AuditTrailService`] keeps the append-only audit log.
//! - [`stats::CollaborationStatsAggregator`] reports organization activity.

pub mod audit;
pub mod audit_trail;
pub mod clock;
pub mod config;
pub mod diff;
pub mod document;
pub mod engine;
pub mod error;
pub mod hashing;
pub mod history;
pub mod memory;
pub mod myers;
pub mod notify;
pub mod share;
pub mod share_manager;
pub mod stats;
pub mod store;
pub mod types;

pub use engine::{Engine, EngineStores};
pub use error::CoreError;
