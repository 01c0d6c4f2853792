//! In-process implementation of every store trait.
//!
//! All state sits behind one `tokio::sync::RwLock`. Conditional counter
//! updates take the write lock for the whole check-and-increment, which
//! gives the same guarantee as the single-statement UPDATE in PostgreSQL.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::audit::{sort_newest_first, AuditEvent, AuditFilter, NewAuditEvent};
use crate::clock::{Clock, SystemClock};
use crate::diff::{DiffKey, VersionDiffResult};
use crate::document::{Document, DocumentVersion, VersionSnapshot};
use crate::share::{NewAccessLogEntry, NewShare, SecureShare, ShareAccessLogEntry};
use crate::store::{AuditStore, DiffCache, IdentityResolver, ShareStore, StoreError, VersionStore};
use crate::types::{DbId, Timestamp, VersionNumber, UNLIMITED};

#[derive(Default)]
struct State {
    next_id: DbId,
    documents: BTreeMap<DbId, Document>,
    versions: BTreeMap<(DbId, VersionNumber), DocumentVersion>,
    shares: BTreeMap<DbId, SecureShare>,
    access_log: Vec<ShareAccessLogEntry>,
    audit: Vec<AuditEvent>,
    diffs: HashMap<DiffKey, VersionDiffResult>,
}

impl State {
    fn allocate_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document with no versions yet.
    pub async fn insert_document(&self, organization_id: DbId, title: &str) -> Document {
        self.insert_document_at(organization_id, title, SystemClock.now()).await
    }

    pub async fn insert_document_at(&self, organization_id: DbId, title: &str, created_at: Timestamp) -> Document {
        let mut state = self.state.write().await;
        let document = Document {
            id: state.allocate_id(),
            organization_id,
            title: title.to_string(),
            current_version: 0,
            created_at,
        };
        state.documents.insert(document.id, document.clone());
        document
    }

    /// Number of cached comparisons.
    pub async fn cached_diff_count(&self) -> usize {
        self.state.read().await.diffs.len()
    }

    /// Number of audit events stored for a document.
    pub async fn audit_event_count(&self, document_id: DbId) -> usize {
        self.state
            .read()
            .await
            .audit
            .iter()
            .filter(|e| e.document_id == document_id)
            .count()
    }
}

// ---------------------------------------------------------------------------
// VersionStore
// ---------------------------------------------------------------------------

#[async_trait]
impl VersionStore for InMemoryStore {
    async fn load_document(&self, document_id: DbId) -> Result<Option<Document>, StoreError> {
        Ok(self.state.read().await.documents.get(&document_id).cloned())
    }

    async fn list_documents(&self, organization_id: DbId) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .documents
            .values()
            .filter(|d| d.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn load_version(
        &self,
        document_id: DbId,
        version_number: VersionNumber,
    ) -> Result<Option<DocumentVersion>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .versions
            .get(&(document_id, version_number))
            .cloned())
    }

    async fn list_versions(
        &self,
        document_id: DbId,
        limit: Option<usize>,
    ) -> Result<Vec<DocumentVersion>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .versions
            .range((document_id, VersionNumber::MIN)..=(document_id, VersionNumber::MAX))
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn append_version(&self, snapshot: VersionSnapshot) -> Result<DocumentVersion, StoreError> {
        let mut state = self.state.write().await;
        let current = state
            .documents
            .get(&snapshot.document_id)
            .map(|d| d.current_version)
            .ok_or_else(|| StoreError::Backend(format!("document {} does not exist", snapshot.document_id)))?;

        if snapshot.version_number != current + 1 {
            return Err(StoreError::Conflict(format!(
                "version {} of document {} already exists or is out of sequence",
                snapshot.version_number, snapshot.document_id
            )));
        }

        let version = DocumentVersion {
            id: state.allocate_id(),
            document_id: snapshot.document_id,
            version_number: snapshot.version_number,
            title: snapshot.title,
            content: snapshot.content,
            metadata: snapshot.metadata,
            quality_score: snapshot.quality_score,
            change_summary: snapshot.change_summary,
            created_by: snapshot.created_by,
            created_at: snapshot.created_at,
        };
        if let Some(document) = state.documents.get_mut(&version.document_id) {
            document.current_version = version.version_number;
            document.title = version.title.clone();
        }
        state
            .versions
            .insert((version.document_id, version.version_number), version.clone());
        Ok(version)
    }
}

// ---------------------------------------------------------------------------
// ShareStore
// ---------------------------------------------------------------------------

#[async_trait]
impl ShareStore for InMemoryStore {
    async fn load_share(&self, slug: &str) -> Result<Option<SecureShare>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .shares
            .values()
            .find(|s| s.slug == slug)
            .cloned())
    }

    async fn load_share_by_id(&self, share_id: DbId) -> Result<Option<SecureShare>, StoreError> {
        Ok(self.state.read().await.shares.get(&share_id).cloned())
    }

    async fn save_share(&self, share: NewShare) -> Result<SecureShare, StoreError> {
        let mut state = self.state.write().await;
        if state.shares.values().any(|s| s.slug == share.slug) {
            return Err(StoreError::Conflict("share slug already in use".into()));
        }
        let saved = SecureShare {
            id: state.allocate_id(),
            document_id: share.document_id,
            organization_id: share.organization_id,
            slug: share.slug,
            access_code_hash: share.access_code_hash,
            permission: share.permission,
            valid_from: share.valid_from,
            expires_at: share.expires_at,
            allowed_views: share.allowed_views,
            view_count: 0,
            allowed_downloads: share.allowed_downloads,
            download_count: 0,
            allowed_ips: share.allowed_ips,
            requires_authentication: share.requires_authentication,
            is_active: true,
            revoked_at: None,
            revoked_by: None,
            revocation_reason: None,
            created_by: share.created_by,
            created_at: share.created_at,
        };
        state.shares.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn list_shares_for_document(&self, document_id: DbId) -> Result<Vec<SecureShare>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .shares
            .values()
            .filter(|s| s.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn list_shares_for_organization(
        &self,
        organization_id: DbId,
    ) -> Result<Vec<SecureShare>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .shares
            .values()
            .filter(|s| s.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn try_increment_views(&self, share_id: DbId) -> Result<Option<SecureShare>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.shares.get_mut(&share_id).and_then(|share| {
            let under_limit = share.allowed_views == UNLIMITED || share.view_count < share.allowed_views;
            (share.is_active && under_limit).then(|| {
                share.view_count += 1;
                share.clone()
            })
        }))
    }

    async fn try_increment_downloads(&self, share_id: DbId) -> Result<Option<SecureShare>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.shares.get_mut(&share_id).and_then(|share| {
            let under_limit =
                share.allowed_downloads == UNLIMITED || share.download_count < share.allowed_downloads;
            (share.is_active && under_limit).then(|| {
                share.download_count += 1;
                share.clone()
            })
        }))
    }

    async fn revoke(
        &self,
        share_id: DbId,
        revoked_by: DbId,
        reason: Option<&str>,
        at: Timestamp,
    ) -> Result<Option<SecureShare>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state
            .shares
            .get_mut(&share_id)
            .filter(|share| share.is_active)
            .map(|share| {
                share.is_active = false;
                share.revoked_at = Some(at);
                share.revoked_by = Some(revoked_by);
                share.revocation_reason = reason.map(str::to_string);
                share.clone()
            }))
    }

    async fn append_access_log(
        &self,
        entry: NewAccessLogEntry,
    ) -> Result<ShareAccessLogEntry, StoreError> {
        let mut state = self.state.write().await;
        let stored = ShareAccessLogEntry {
            id: state.allocate_id(),
            share_id: entry.share_id,
            access_type: entry.access_type,
            requester_ip: entry.requester_ip,
            requester_identity: entry.requester_identity,
            success: entry.success,
            failure_reason: entry.failure_reason,
            created_at: entry.created_at,
        };
        state.access_log.push(stored.clone());
        Ok(stored)
    }

    async fn list_access_log(
        &self,
        share_id: DbId,
        limit: usize,
    ) -> Result<Vec<ShareAccessLogEntry>, StoreError> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .access_log
            .iter()
            .filter(|e| e.share_id == share_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        entries.truncate(limit);
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// AuditStore
// ---------------------------------------------------------------------------

#[async_trait]
impl AuditStore for InMemoryStore {
    async fn append_event(&self, event: NewAuditEvent) -> Result<AuditEvent, StoreError> {
        let mut state = self.state.write().await;
        let stored = AuditEvent {
            id: state.allocate_id(),
            document_id: event.document_id,
            event_type: event.event_type,
            description: event.description,
            actor_id: event.actor_id,
            before: event.before,
            after: event.after,
            field_changes: event.field_changes,
            metadata: event.metadata,
            created_at: event.created_at.unwrap_or_else(|| SystemClock.now()),
        };
        state.audit.push(stored.clone());
        Ok(stored)
    }

    async fn query_events(
        &self,
        document_id: DbId,
        filter: &AuditFilter,
        limit: Option<usize>,
    ) -> Result<Vec<AuditEvent>, StoreError> {
        let state = self.state.read().await;
        let mut events: Vec<_> = state
            .audit
            .iter()
            .filter(|e| e.document_id == document_id)
            .filter(|e| filter.event_type.is_none_or(|t| e.event_type == t))
            .filter(|e| filter.actor_id.is_none_or(|a| e.actor_id == Some(a)))
            .filter(|e| filter.since.is_none_or(|since| e.created_at >= since))
            .cloned()
            .collect();
        sort_newest_first(&mut events);
        if let Some(limit) = limit {
            events.truncate(limit);
        }
        Ok(events)
    }
}

// ---------------------------------------------------------------------------
// DiffCache
// ---------------------------------------------------------------------------

#[async_trait]
impl DiffCache for InMemoryStore {
    async fn get(&self, key: &DiffKey) -> Result<Option<VersionDiffResult>, StoreError> {
        Ok(self.state.read().await.diffs.get(key).cloned())
    }

    async fn put(&self, key: &DiffKey, result: &VersionDiffResult) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .diffs
            .entry(*key)
            .or_insert_with(|| result.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Fixed actor-id → display-name table.
#[derive(Debug, Default, Clone)]
pub struct StaticIdentityResolver {
    names: HashMap<DbId, String>,
}

impl StaticIdentityResolver {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = (DbId, S)>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(|(id, name)| (id, name.into())).collect(),
        }
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn display_name(&self, actor_id: DbId) -> Result<Option<String>, StoreError> {
        Ok(self.names.get(&actor_id).cloned())
    }
}
