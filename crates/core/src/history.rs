//! Version lineage: recording, restoring and listing snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::audit::{AuditEventType, NewAuditEvent};
use crate::audit_trail::AuditTrailService;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::diff::{DiffEngine, DiffOptions, VersionDiffResult};
use crate::document::{validate_version_number, Document, DocumentVersion, Metadata, NewVersion, VersionSnapshot};
use crate::error::CoreError;
use crate::notify::{EventHook, Notification};
use crate::store::{bounded, IdentityResolver, VersionStore};
use crate::types::{DbId, Timestamp, VersionNumber};

/// Options for [`VersionHistoryService::get_history`].
#[derive(Debug, Clone, Default)]
pub struct HistoryOptions {
    /// Page size; defaults to `history_default_limit`.
    pub limit: Option<usize>,
    /// Embed each snapshot's metadata map in its summary.
    pub include_metadata: bool,
    /// The caller's organization. A document owned by another organization
    /// is refused.
    pub organization_id: Option<DbId>,
}

/// One row of a version history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionSummary {
    pub version_number: VersionNumber,
    pub title: String,
    pub change_summary: Option<String>,
    pub created_by: DbId,
    pub created_by_name: Option<String>,
    pub created_at: Timestamp,
    pub quality_score: Option<f64>,
    /// Field changes relative to the previous version (0 for version 1).
    pub changes_from_previous: usize,
    pub is_major: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionHistory {
    pub document_id: DbId,
    pub title: String,
    pub current_version: VersionNumber,
    /// Newest first.
    pub versions: Vec<VersionSummary>,
}

/// Reads and extends the version lineage of documents.
pub struct VersionHistoryService {
    versions: Arc<dyn VersionStore>,
    diff: Arc<DiffEngine>,
    audit: Arc<AuditTrailService>,
    identities: Arc<dyn IdentityResolver>,
    hook: Arc<dyn EventHook>,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
}

impl VersionHistoryService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        versions: Arc<dyn VersionStore>,
        diff: Arc<DiffEngine>,
        audit: Arc<AuditTrailService>,
        identities: Arc<dyn IdentityResolver>,
        hook: Arc<dyn EventHook>,
        clock: Arc<dyn Clock>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            versions,
            diff,
            audit,
            identities,
            hook,
            clock,
            config,
        }
    }

    /// Version summaries newest first, each annotated with its change count
    /// relative to the previous version.
    pub async fn get_history(
        &self,
        document_id: DbId,
        options: &HistoryOptions,
    ) -> Result<VersionHistory, CoreError> {
        let document = self.load_document(document_id).await?;
        if let Some(org) = options.organization_id {
            if org != document.organization_id {
                return Err(CoreError::Permission(format!(
                    "document {document_id} belongs to another organization"
                )));
            }
        }

        let limit = self
            .config
            .clamp_limit(options.limit, self.config.history_default_limit);
        let versions = bounded(
            self.config.store_timeout(),
            "list_versions",
            self.versions.list_versions(document_id, Some(limit)),
        )
        .await?;

        let counts_only = DiffOptions {
            include_content_diff: false,
            include_metadata: true,
        };
        let mut names: HashMap<DbId, Option<String>> = HashMap::new();
        let mut summaries = Vec::with_capacity(versions.len());

        for version in versions {
            let changes_from_previous = if version.version_number > 1 {
                self.diff
                    .compare(
                        document_id,
                        version.version_number - 1,
                        version.version_number,
                        &counts_only,
                    )
                    .await?
                    .total_changes
            } else {
                0
            };

            let created_by_name = match names.get(&version.created_by) {
                Some(name) => name.clone(),
                None => {
                    let name = self.display_name(version.created_by).await;
                    names.insert(version.created_by, name.clone());
                    name
                }
            };

            summaries.push(VersionSummary {
                version_number: version.version_number,
                title: version.title,
                change_summary: version.change_summary,
                created_by: version.created_by,
                created_by_name,
                created_at: version.created_at,
                quality_score: version.quality_score,
                changes_from_previous,
                is_major: changes_from_previous > self.config.major_change_threshold,
                metadata: options.include_metadata.then_some(version.metadata),
            });
        }

        Ok(VersionHistory {
            document_id,
            title: document.title,
            current_version: document.current_version,
            versions: summaries,
        })
    }

    pub async fn get_version(
        &self,
        document_id: DbId,
        version_number: VersionNumber,
    ) -> Result<DocumentVersion, CoreError> {
        validate_version_number(version_number)?;
        bounded(
            self.config.store_timeout(),
            "load_version",
            self.versions.load_version(document_id, version_number),
        )
        .await?
        .ok_or_else(|| {
            CoreError::not_found("document_version", format!("{document_id}@v{version_number}"))
        })
    }

    /// Append the next version of a document.
    ///
    /// A concurrent writer that claims the same number first makes this call
    /// fail with a store conflict; nothing is overwritten.
    pub async fn record_version(
        &self,
        document_id: DbId,
        input: NewVersion,
    ) -> Result<DocumentVersion, CoreError> {
        input.validate()?;
        let actor = input.created_by;
        let (version, previous) = self.append_next(document_id, input).await?;

        let description = match &version.change_summary {
            Some(summary) => format!("Version {} created: {summary}", version.version_number),
            None => format!("Version {} created", version.version_number),
        };
        let mut event = NewAuditEvent::new(document_id, AuditEventType::VersionCreated, description)
            .with_actor(actor)
            .with_metadata(serde_json::json!({ "version_number": version.version_number }));
        if let Some(previous) = &previous {
            event = event.with_field_changes(VersionDiffResult::between(previous, &version).field_change_map());
        }
        self.audit.record(event).await;

        self.hook.emit(Notification::VersionCreated {
            document_id,
            version_number: version.version_number,
            created_by: actor,
        });
        Ok(version)
    }

    /// Append a new version that copies an earlier snapshot. History is
    /// never rewritten.
    pub async fn restore_version(
        &self,
        document_id: DbId,
        version_number: VersionNumber,
        actor: DbId,
    ) -> Result<DocumentVersion, CoreError> {
        let source = self.get_version(document_id, version_number).await?;
        let input = NewVersion {
            title: source.title,
            content: source.content,
            metadata: source.metadata,
            quality_score: source.quality_score,
            change_summary: Some(format!("Restored from version {version_number}")),
            created_by: actor,
        };
        let (version, previous) = self.append_next(document_id, input).await?;

        let mut event = NewAuditEvent::new(
            document_id,
            AuditEventType::VersionRestored,
            format!(
                "Version {} restored as version {}",
                version_number, version.version_number
            ),
        )
        .with_actor(actor)
        .with_metadata(serde_json::json!({
            "restored_from": version_number,
            "version_number": version.version_number,
        }));
        if let Some(previous) = &previous {
            event = event.with_field_changes(VersionDiffResult::between(previous, &version).field_change_map());
        }
        self.audit.record(event).await;

        self.hook.emit(Notification::VersionCreated {
            document_id,
            version_number: version.version_number,
            created_by: actor,
        });
        Ok(version)
    }

    /// Append `current_version + 1`, returning it with its predecessor.
    async fn append_next(
        &self,
        document_id: DbId,
        input: NewVersion,
    ) -> Result<(DocumentVersion, Option<DocumentVersion>), CoreError> {
        let document = self.load_document(document_id).await?;
        let previous = if document.current_version > 0 {
            Some(self.get_version(document_id, document.current_version).await?)
        } else {
            None
        };

        let snapshot = VersionSnapshot::from_new(
            document_id,
            document.current_version + 1,
            input,
            self.clock.now(),
        );
        let version = bounded(
            self.config.store_timeout(),
            "append_version",
            self.versions.append_version(snapshot),
        )
        .await?;

        tracing::info!(
            document_id,
            version_number = version.version_number,
            created_by = version.created_by,
            "Document version recorded"
        );
        Ok((version, previous))
    }

    async fn load_document(&self, document_id: DbId) -> Result<Document, CoreError> {
        bounded(
            self.config.store_timeout(),
            "load_document",
            self.versions.load_document(document_id),
        )
        .await?
        .ok_or_else(|| CoreError::not_found("document", document_id))
    }

    async fn display_name(&self, actor_id: DbId) -> Option<String> {
        match bounded(
            self.config.store_timeout(),
            "display_name",
            self.identities.display_name(actor_id),
        )
        .await
        {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(actor_id, error = %e, "Identity lookup failed");
                None
            }
        }
    }
}
