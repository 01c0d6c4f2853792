//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod audit_event_repo;
pub mod diff_cache_repo;
pub mod document_repo;
pub mod secure_share_repo;

pub use audit_event_repo::AuditEventRepo;
pub use diff_cache_repo::DiffCacheRepo;
pub use document_repo::{DocumentRepo, DocumentVersionRepo};
pub use secure_share_repo::{SecureShareRepo, ShareAccessLogRepo};
