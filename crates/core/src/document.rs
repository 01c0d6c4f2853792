//! Documents and their immutable version snapshots.
//!
//! The surrounding CRUD layer owns documents; the engine reads them as
//! context and appends [`DocumentVersion`] rows, never rewriting one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp, VersionNumber};

/// Snapshot metadata. A `BTreeMap` keeps key order, and therefore diffs and
/// serialized results, deterministic.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 500;

/// Maximum change-summary length in characters.
pub const MAX_CHANGE_SUMMARY_LEN: usize = 2_000;

/// Read-mostly document context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DbId,
    pub organization_id: DbId,
    pub title: String,
    /// Highest version number appended so far (0 before the first version).
    pub current_version: VersionNumber,
    pub created_at: Timestamp,
}

/// An immutable snapshot of a document at one edit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub id: DbId,
    pub document_id: DbId,
    pub version_number: VersionNumber,
    pub title: String,
    pub content: String,
    pub metadata: Metadata,
    pub quality_score: Option<f64>,
    pub change_summary: Option<String>,
    pub created_by: DbId,
    pub created_at: Timestamp,
}

/// Input for appending a version. The version number is assigned by the
/// history service, never by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewVersion {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub quality_score: Option<f64>,
    pub change_summary: Option<String>,
    pub created_by: DbId,
}

impl NewVersion {
    /// Validate caller-supplied fields.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_title(&self.title)?;
        if let Some(score) = self.quality_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(CoreError::Validation(
                    "Quality score must be between 0.0 and 1.0".into(),
                ));
            }
        }
        if let Some(summary) = &self.change_summary {
            if summary.chars().count() > MAX_CHANGE_SUMMARY_LEN {
                return Err(CoreError::Validation(format!(
                    "Change summary must be at most {MAX_CHANGE_SUMMARY_LEN} characters"
                )));
            }
        }
        Ok(())
    }
}

/// Fully-formed snapshot handed to [`crate::store::VersionStore::append_version`].
#[derive(Debug, Clone, PartialEq)]
pub struct VersionSnapshot {
    pub document_id: DbId,
    pub version_number: VersionNumber,
    pub title: String,
    pub content: String,
    pub metadata: Metadata,
    pub quality_score: Option<f64>,
    pub change_summary: Option<String>,
    pub created_by: DbId,
    pub created_at: Timestamp,
}

impl VersionSnapshot {
    pub fn from_new(
        document_id: DbId,
        version_number: VersionNumber,
        input: NewVersion,
        created_at: Timestamp,
    ) -> Self {
        Self {
            document_id,
            version_number,
            title: input.title,
            content: input.content,
            metadata: input.metadata,
            quality_score: input.quality_score,
            change_summary: input.change_summary,
            created_by: input.created_by,
            created_at,
        }
    }
}

/// Validate a document/version title (non-empty, at most [`MAX_TITLE_LEN`] chars).
pub fn validate_title(title: &str) -> Result<(), CoreError> {
    if title.trim().is_empty() {
        return Err(CoreError::Validation("Title must not be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(CoreError::Validation(format!(
            "Title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

/// Version numbers passed in by callers must be 1-based.
pub fn validate_version_number(version: VersionNumber) -> Result<(), CoreError> {
    if version < 1 {
        return Err(CoreError::Validation(format!(
            "Version numbers start at 1, got {version}"
        )));
    }
    Ok(())
}
