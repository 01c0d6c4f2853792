//! Row types for the engine tables.
//!
//! Each row derives `FromRow` and converts into the matching
//! `lexledger-core` value type. Text-encoded enums are parsed on the way
//! out and reported as [`crate::error::UnexpectedValue`] when unknown.

pub mod audit_event;
pub mod diff_cache;
pub mod document;
pub mod secure_share;
