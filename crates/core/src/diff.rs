//! Field- and content-level comparison of two version snapshots.
//!
//! Snapshots are immutable, so a comparison is a pure function of
//! `(document, from, to)`. Results are computed in full, cached write-once,
//! and trimmed to the caller's [`DiffOptions`] on the way out.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::document::{validate_version_number, DocumentVersion};
use crate::error::CoreError;
use crate::myers;
use crate::store::{bounded, DiffCache, VersionStore};
use crate::types::{DbId, VersionNumber};

/// Diffs at or above this confidence count as significant.
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.8;

/// Confidence assigned to case/whitespace-only edits.
pub const COSMETIC_CONFIDENCE: f64 = 0.5;

/// Summary text for a comparison with no differences.
pub const NO_CHANGES_SUMMARY: &str = "No changes";

/// How many field paths the summary names before eliding the rest.
const SUMMARY_MAX_FIELDS: usize = 5;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a field differs between two snapshots.
///
/// - `Added`    -- present only in the newer side.
/// - `Removed`  -- present only in the older side.
/// - `Modified` -- present in both sides with different values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected difference in a named attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    /// Dotted path: `title`, `content`, `quality_score`, `metadata.<key>[.<sub>...]`.
    pub field_path: String,
    pub old_value: serde_json::Value,
    pub new_value: serde_json::Value,
    pub change_type: ChangeType,
    pub confidence: f64,
}

impl FieldDiff {
    pub fn is_significant(&self) -> bool {
        self.confidence >= SIGNIFICANCE_THRESHOLD
    }

    fn is_metadata(&self) -> bool {
        self.field_path.starts_with("metadata.")
    }
}

/// Line-level rendering of a content change plus word-level counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDiff {
    pub format: String,
    pub diff_text: String,
    /// Words inserted inside changed blocks.
    pub additions_count: usize,
    /// Words deleted inside changed blocks.
    pub deletions_count: usize,
    /// Lines replaced (paired removed/added lines within a block).
    pub modifications_count: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
}

impl ContentDiff {
    pub fn is_empty(&self) -> bool {
        self.lines_added == 0 && self.lines_removed == 0
    }
}

/// Before/after of one metadata key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataChange {
    pub old: serde_json::Value,
    pub new: serde_json::Value,
}

/// Cache key for a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiffKey {
    pub document_id: DbId,
    pub from_version: VersionNumber,
    pub to_version: VersionNumber,
}

impl fmt::Display for DiffKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}..v{}", self.document_id, self.from_version, self.to_version)
    }
}

/// Full comparison of two versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDiffResult {
    pub document_id: DbId,
    pub from_version: VersionNumber,
    pub to_version: VersionNumber,
    pub field_diffs: Vec<FieldDiff>,
    pub content_diff: Option<ContentDiff>,
    pub metadata_changes: BTreeMap<String, MetadataChange>,
    pub total_changes: usize,
    pub significant_changes: usize,
    pub summary: String,
}

/// Inclusion flags. They never change how the diff is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DiffOptions {
    pub include_content_diff: bool,
    pub include_metadata: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            include_content_diff: true,
            include_metadata: true,
        }
    }
}

impl VersionDiffResult {
    /// Compare two snapshots of the same document.
    pub fn between(from: &DocumentVersion, to: &DocumentVersion) -> Self {
        let field_diffs = compute_field_diffs(from, to);
        let content_diff = compute_content_diff(
            &from.content,
            &to.content,
            &format!("version {}", from.version_number),
            &format!("version {}", to.version_number),
        );

        let mut result = Self {
            document_id: to.document_id,
            from_version: from.version_number,
            to_version: to.version_number,
            field_diffs,
            content_diff: Some(content_diff),
            metadata_changes: BTreeMap::new(),
            total_changes: 0,
            significant_changes: 0,
            summary: String::new(),
        };
        result.finalize();
        result
    }

    /// Trim the result to the requested inclusions.
    pub fn project(mut self, options: &DiffOptions) -> Self {
        if !options.include_metadata {
            self.field_diffs.retain(|d| !d.is_metadata());
        }
        if !options.include_content_diff {
            self.content_diff = None;
        }
        self.finalize();
        self
    }

    /// Field-change map suitable for an audit event: path -> change details.
    /// Content is summarized by counts rather than copied.
    pub fn field_change_map(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for diff in &self.field_diffs {
            let entry = if diff.field_path == "content" {
                let counts = self.content_diff.as_ref();
                serde_json::json!({
                    "change_type": diff.change_type,
                    "additions": counts.map_or(0, |c| c.additions_count),
                    "deletions": counts.map_or(0, |c| c.deletions_count),
                })
            } else {
                serde_json::json!({
                    "change_type": diff.change_type,
                    "old": diff.old_value,
                    "new": diff.new_value,
                })
            };
            map.insert(diff.field_path.clone(), entry);
        }
        serde_json::Value::Object(map)
    }

    /// Recompute metadata map, totals and summary from `field_diffs`.
    fn finalize(&mut self) {
        self.metadata_changes = self
            .field_diffs
            .iter()
            .filter(|d| d.is_metadata())
            .map(|d| {
                (
                    d.field_path["metadata.".len()..].to_string(),
                    MetadataChange {
                        old: d.old_value.clone(),
                        new: d.new_value.clone(),
                    },
                )
            })
            .collect();
        self.total_changes = self.field_diffs.len();
        self.significant_changes = self.field_diffs.iter().filter(|d| d.is_significant()).count();
        self.summary = summarize(self);
    }
}

fn summarize(result: &VersionDiffResult) -> String {
    if result.total_changes == 0 {
        return NO_CHANGES_SUMMARY.to_string();
    }

    let mut named: Vec<&str> = result
        .field_diffs
        .iter()
        .take(SUMMARY_MAX_FIELDS)
        .map(|d| d.field_path.as_str())
        .collect();
    let more = result.total_changes.saturating_sub(SUMMARY_MAX_FIELDS);
    let elided = format!("and {more} more");
    if more > 0 {
        named.push(&elided);
    }

    let plural = if result.total_changes == 1 { "" } else { "s" };
    let mut summary = format!(
        "{} field change{plural} ({} significant): {}",
        result.total_changes,
        result.significant_changes,
        named.join(", ")
    );
    if let Some(content) = result.content_diff.as_ref().filter(|c| !c.is_empty()) {
        summary.push_str(&format!(
            "; content +{}/-{} words, {} line(s) modified",
            content.additions_count, content.deletions_count, content.modifications_count
        ));
    }
    summary
}

// ---------------------------------------------------------------------------
// Field diff
// ---------------------------------------------------------------------------

/// Compare pseudo-fields (`title`, `content`, `quality_score`) and every
/// flattened metadata path of two snapshots.
pub fn compute_field_diffs(from: &DocumentVersion, to: &DocumentVersion) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();

    if from.title != to.title {
        diffs.push(modified("title", from.title.clone().into(), to.title.clone().into()));
    }
    if from.content != to.content {
        diffs.push(modified(
            "content",
            from.content.clone().into(),
            to.content.clone().into(),
        ));
    }
    let score = |s: Option<f64>| s.map_or(serde_json::Value::Null, serde_json::Value::from);
    if let Some(diff) = diff_optional("quality_score", score(from.quality_score), score(to.quality_score)) {
        diffs.push(diff);
    }

    let old_meta = flatten_metadata(&from.metadata);
    let new_meta = flatten_metadata(&to.metadata);
    let mut keys: Vec<&String> = old_meta.keys().chain(new_meta.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        let path = format!("metadata.{key}");
        let old = old_meta.get(key).cloned().unwrap_or(serde_json::Value::Null);
        let new = new_meta.get(key).cloned().unwrap_or(serde_json::Value::Null);
        let diff = match (old_meta.contains_key(key), new_meta.contains_key(key)) {
            (false, true) => Some(structural(&path, old, new, ChangeType::Added)),
            (true, false) => Some(structural(&path, old, new, ChangeType::Removed)),
            _ if old != new => Some(modified(&path, old, new)),
            _ => None,
        };
        diffs.extend(diff);
    }
    diffs
}

fn diff_optional(path: &str, old: serde_json::Value, new: serde_json::Value) -> Option<FieldDiff> {
    match (old.is_null(), new.is_null()) {
        (true, true) => None,
        (true, false) => Some(structural(path, old, new, ChangeType::Added)),
        (false, true) => Some(structural(path, old, new, ChangeType::Removed)),
        (false, false) if old != new => Some(modified(path, old, new)),
        _ => None,
    }
}

fn structural(
    path: &str,
    old: serde_json::Value,
    new: serde_json::Value,
    change_type: ChangeType,
) -> FieldDiff {
    FieldDiff {
        field_path: path.to_string(),
        old_value: old,
        new_value: new,
        change_type,
        confidence: 1.0,
    }
}

fn modified(path: &str, old: serde_json::Value, new: serde_json::Value) -> FieldDiff {
    let confidence = modification_confidence(&old, &new);
    FieldDiff {
        field_path: path.to_string(),
        old_value: old,
        new_value: new,
        change_type: ChangeType::Modified,
        confidence,
    }
}

/// Case- or whitespace-only string edits are cosmetic.
fn modification_confidence(old: &serde_json::Value, new: &serde_json::Value) -> f64 {
    match (old.as_str(), new.as_str()) {
        (Some(a), Some(b)) if normalize(a) == normalize(b) => COSMETIC_CONFIDENCE,
        _ => 1.0,
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Flatten nested objects into dotted keys. Arrays, scalars and empty
/// objects are leaves.
///
/// Segments are escaped with [`escape_segment`], so a literal `"a.b"` key
/// and a nested `{"a": {"b": ..}}` yield distinct paths (`a\.b` and `a.b`).
pub fn flatten_metadata(
    metadata: &BTreeMap<String, serde_json::Value>,
) -> BTreeMap<String, serde_json::Value> {
    let mut out = BTreeMap::new();
    for (key, value) in metadata {
        flatten_into(escape_segment(key), value, &mut out);
    }
    out
}

/// Backslash-escape `\` and `.` inside one key segment.
pub fn escape_segment(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for c in key.chars() {
        if c == '\\' || c == '.' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn flatten_into(
    path: String,
    value: &serde_json::Value,
    out: &mut BTreeMap<String, serde_json::Value>,
) {
    match value {
        serde_json::Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(format!("{path}.{}", escape_segment(key)), child, out);
            }
        }
        leaf => {
            out.insert(path, leaf.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Content diff
// ---------------------------------------------------------------------------

/// Line diff rendered as unified text, with word-level counts inside each
/// changed block.
pub fn compute_content_diff(old: &str, new: &str, old_label: &str, new_label: &str) -> ContentDiff {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let edits = myers::diff(&old_lines, &new_lines);

    let diff_text = myers::render_unified(
        &old_lines,
        &new_lines,
        &edits,
        old_label,
        new_label,
        myers::DEFAULT_CONTEXT,
    );

    let mut stats = ContentDiff {
        format: "unified".to_string(),
        diff_text,
        additions_count: 0,
        deletions_count: 0,
        modifications_count: 0,
        lines_added: 0,
        lines_removed: 0,
    };

    for block in myers::change_blocks(&edits) {
        stats.lines_removed += block.removed.len();
        stats.lines_added += block.added.len();
        stats.modifications_count += block.removed.len().min(block.added.len());

        let old_words: Vec<&str> = block
            .removed
            .iter()
            .flat_map(|&i| old_lines[i].split_whitespace())
            .collect();
        let new_words: Vec<&str> = block
            .added
            .iter()
            .flat_map(|&j| new_lines[j].split_whitespace())
            .collect();
        for edit in myers::diff(&old_words, &new_words) {
            match edit {
                myers::Edit::Insert { .. } => stats.additions_count += 1,
                myers::Edit::Delete { .. } => stats.deletions_count += 1,
                myers::Edit::Equal { .. } => {}
            }
        }
    }
    stats
}

// ---------------------------------------------------------------------------
// DiffEngine
// ---------------------------------------------------------------------------

/// Compares versions through the version store, memoizing in a [`DiffCache`].
pub struct DiffEngine {
    versions: Arc<dyn VersionStore>,
    cache: Arc<dyn DiffCache>,
    config: Arc<EngineConfig>,
}

impl DiffEngine {
    pub fn new(
        versions: Arc<dyn VersionStore>,
        cache: Arc<dyn DiffCache>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            versions,
            cache,
            config,
        }
    }

    /// Compare `from_version` to `to_version` of a document.
    ///
    /// `from > to` is not an error: the result describes the edit that turns
    /// the `from` snapshot into the `to` snapshot, literally.
    pub async fn compare(
        &self,
        document_id: DbId,
        from_version: VersionNumber,
        to_version: VersionNumber,
        options: &DiffOptions,
    ) -> Result<VersionDiffResult, CoreError> {
        validate_version_number(from_version)?;
        validate_version_number(to_version)?;

        let key = DiffKey {
            document_id,
            from_version,
            to_version,
        };
        let timeout = self.config.store_timeout();

        match bounded(timeout, "diff_cache.get", self.cache.get(&key)).await {
            Ok(Some(cached)) => {
                tracing::debug!(%key, "Diff cache hit");
                return Ok(cached.project(options));
            }
            Ok(None) => tracing::debug!(%key, "Diff cache miss"),
            Err(e) => tracing::warn!(%key, error = %e, "Diff cache read failed, recomputing"),
        }

        bounded(timeout, "load_document", self.versions.load_document(document_id))
            .await?
            .ok_or_else(|| CoreError::not_found("document", document_id))?;

        let from = self.load_version(document_id, from_version).await?;
        let to = if to_version == from_version {
            from.clone()
        } else {
            self.load_version(document_id, to_version).await?
        };

        let result = VersionDiffResult::between(&from, &to);

        if let Err(e) = bounded(timeout, "diff_cache.put", self.cache.put(&key, &result)).await {
            tracing::warn!(%key, error = %e, "Diff cache write failed");
        }

        Ok(result.project(options))
    }

    async fn load_version(
        &self,
        document_id: DbId,
        version: VersionNumber,
    ) -> Result<DocumentVersion, CoreError> {
        bounded(
            self.config.store_timeout(),
            "load_version",
            self.versions.load_version(document_id, version),
        )
        .await?
        .ok_or_else(|| CoreError::not_found("document_version", format!("{document_id}@v{version}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn version(n: VersionNumber, title: &str, content: &str, meta: serde_json::Value) -> DocumentVersion {
        DocumentVersion {
            id: n as DbId,
            document_id: 1,
            version_number: n,
            title: title.into(),
            content: content.into(),
            metadata: serde_json::from_value(meta).unwrap(),
            quality_score: None,
            change_summary: None,
            created_by: 9,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn change_type_display() {
        assert_eq!(ChangeType::Added.to_string(), "added");
        assert_eq!(ChangeType::Modified.as_str(), "modified");
    }

    #[test]
    fn identical_versions_have_no_changes() {
        let v = version(1, "Draft", "A\nB", serde_json::json!({"court": "SDNY"}));
        let result = VersionDiffResult::between(&v, &v);
        assert!(result.field_diffs.is_empty());
        assert_eq!(result.total_changes, 0);
        assert_eq!(result.summary, NO_CHANGES_SUMMARY);
        let content = result.content_diff.unwrap();
        assert_eq!(content.additions_count, 0);
        assert_eq!(content.deletions_count, 0);
        assert_eq!(content.modifications_count, 0);
        assert!(content.diff_text.is_empty());
    }

    #[test]
    fn title_and_content_pseudo_fields() {
        let a = version(1, "Draft", "A", serde_json::json!({}));
        let b = version(2, "Final", "A B", serde_json::json!({}));
        let result = VersionDiffResult::between(&a, &b);

        let title = &result.field_diffs[0];
        assert_eq!(title.field_path, "title");
        assert_eq!(title.old_value, "Draft");
        assert_eq!(title.new_value, "Final");
        assert_eq!(title.change_type, ChangeType::Modified);

        let content = result.content_diff.unwrap();
        assert!(content.additions_count >= 1);
        assert_eq!(content.deletions_count, 0);
        assert_eq!(content.modifications_count, 1);
    }

    #[test]
    fn metadata_added_removed_modified_with_dotted_paths() {
        let a = version(
            1,
            "T",
            "",
            serde_json::json!({"court": "SDNY", "parties": {"plaintiff": "Acme"}, "stale": true}),
        );
        let b = version(
            2,
            "T",
            "",
            serde_json::json!({"court": "EDNY", "parties": {"plaintiff": "Acme", "defendant": "Beta"}}),
        );
        let result = VersionDiffResult::between(&a, &b);
        let paths: Vec<_> = result
            .field_diffs
            .iter()
            .map(|d| (d.field_path.as_str(), d.change_type))
            .collect();
        assert_eq!(
            paths,
            vec![
                ("metadata.court", ChangeType::Modified),
                ("metadata.parties.defendant", ChangeType::Added),
                ("metadata.stale", ChangeType::Removed),
            ]
        );
        assert_eq!(result.metadata_changes["court"].old, "SDNY");
        assert_eq!(result.metadata_changes["parties.defendant"].old, serde_json::Value::Null);
    }

    #[test]
    fn dotted_key_beside_nested_object_keeps_both_paths() {
        let a = version(1, "T", "", serde_json::json!({"a.b": 1, "a": {"b": 2}}));
        let b = version(2, "T", "", serde_json::json!({"a.b": 1, "a": {"b": 3}}));

        let flat = flatten_metadata(&a.metadata);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat["a\\.b"], 1);
        assert_eq!(flat["a.b"], 2);

        let result = VersionDiffResult::between(&a, &b);
        assert_eq!(result.total_changes, 1);
        assert_eq!(result.field_diffs[0].field_path, "metadata.a.b");
        assert_eq!(result.field_diffs[0].old_value, 2);
        assert_eq!(result.field_diffs[0].new_value, 3);
        assert_ne!(result.summary, NO_CHANGES_SUMMARY);

        let c = version(3, "T", "", serde_json::json!({"a.b": 5, "a": {"b": 3}}));
        let result = VersionDiffResult::between(&b, &c);
        assert_eq!(result.total_changes, 1);
        assert_eq!(result.field_diffs[0].field_path, "metadata.a\\.b");
        assert_eq!(result.metadata_changes["a\\.b"].new, 5);
    }

    #[test]
    fn backslashes_in_keys_are_escaped() {
        assert_eq!(escape_segment("plain"), "plain");
        assert_eq!(escape_segment("a.b"), "a\\.b");
        assert_eq!(escape_segment("a\\.b"), "a\\\\\\.b");
    }

    #[test]
    fn leaf_becoming_object_is_removed_then_added() {
        let a = version(1, "T", "", serde_json::json!({"a": 1}));
        let b = version(2, "T", "", serde_json::json!({"a": {"b": 1}}));
        let result = VersionDiffResult::between(&a, &b);
        let paths: Vec<_> = result
            .field_diffs
            .iter()
            .map(|d| (d.field_path.as_str(), d.change_type))
            .collect();
        assert_eq!(
            paths,
            vec![
                ("metadata.a", ChangeType::Removed),
                ("metadata.a.b", ChangeType::Added),
            ]
        );

        let back = VersionDiffResult::between(&b, &a);
        let paths: Vec<_> = back.field_diffs.iter().map(|d| (d.field_path.as_str(), d.change_type)).collect();
        assert_eq!(
            paths,
            vec![
                ("metadata.a", ChangeType::Added),
                ("metadata.a.b", ChangeType::Removed),
            ]
        );
    }

    #[test]
    fn cosmetic_edits_are_not_significant() {
        let a = version(1, "Motion  to dismiss", "", serde_json::json!({}));
        let b = version(2, "Motion to Dismiss", "", serde_json::json!({}));
        let result = VersionDiffResult::between(&a, &b);
        assert_eq!(result.total_changes, 1);
        assert_eq!(result.significant_changes, 0);
        assert_eq!(result.field_diffs[0].confidence, COSMETIC_CONFIDENCE);
    }

    #[test]
    fn quality_score_compared_when_present() {
        let mut a = version(1, "T", "", serde_json::json!({}));
        let mut b = version(2, "T", "", serde_json::json!({}));
        a.quality_score = Some(0.4);
        b.quality_score = Some(0.9);
        let result = VersionDiffResult::between(&a, &b);
        assert_eq!(result.field_diffs[0].field_path, "quality_score");

        b.quality_score = None;
        let result = VersionDiffResult::between(&a, &b);
        assert_eq!(result.field_diffs[0].change_type, ChangeType::Removed);
    }

    #[test]
    fn projection_drops_metadata_and_content() {
        let a = version(1, "A", "x", serde_json::json!({"k": 1}));
        let b = version(2, "B", "y", serde_json::json!({"k": 2}));
        let full = VersionDiffResult::between(&a, &b);
        assert_eq!(full.total_changes, 3);

        let trimmed = full.clone().project(&DiffOptions {
            include_content_diff: false,
            include_metadata: false,
        });
        assert_eq!(trimmed.total_changes, 2);
        assert!(trimmed.metadata_changes.is_empty());
        assert!(trimmed.content_diff.is_none());
        assert!(!trimmed.summary.contains("metadata.k"));
    }

    #[test]
    fn summary_elides_long_field_lists() {
        let a = version(1, "A", "", serde_json::json!({}));
        let meta: serde_json::Value = (0..8).map(|i| (format!("k{i}"), serde_json::json!(i))).collect::<serde_json::Map<_, _>>().into();
        let b = version(2, "A", "", meta);
        let result = VersionDiffResult::between(&a, &b);
        assert_eq!(result.total_changes, 8);
        assert!(result.summary.contains("and 3 more"), "{}", result.summary);
    }

    #[test]
    fn content_counts_pure_insertions_and_deletions() {
        let diff = compute_content_diff("one\ntwo", "one\ntwo\nthree four", "a", "b");
        assert_eq!(diff.lines_added, 1);
        assert_eq!(diff.additions_count, 2);
        assert_eq!(diff.deletions_count, 0);
        assert_eq!(diff.modifications_count, 0);

        let diff = compute_content_diff("one\ntwo", "", "a", "b");
        assert_eq!(diff.lines_removed, 2);
        assert_eq!(diff.deletions_count, 2);
        assert_eq!(diff.additions_count, 0);
    }

    #[test]
    fn field_change_map_summarizes_content() {
        let a = version(1, "Draft", "A", serde_json::json!({}));
        let b = version(2, "Final", "A B", serde_json::json!({}));
        let map = VersionDiffResult::between(&a, &b).field_change_map();
        assert_eq!(map["title"]["old"], "Draft");
        assert_eq!(map["content"]["additions"], 1);
        assert!(map["content"].get("old").is_none());
    }

    #[test]
    fn results_serialize_deterministically() {
        let a = version(1, "A", "x\ny", serde_json::json!({"b": 1, "a": {"z": 1, "y": 2}}));
        let b = version(2, "B", "y\nz", serde_json::json!({"a": {"y": 3}, "c": 4}));
        let first = serde_json::to_string(&VersionDiffResult::between(&a, &b)).unwrap();
        let second = serde_json::to_string(&VersionDiffResult::between(&a, &b)).unwrap();
        assert_eq!(first, second);
    }
}
