//! Organization-level collaboration statistics. Read-only.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::share::ShareStatus;
use crate::store::{bounded, IdentityResolver, ShareStore, VersionStore};
use crate::types::{DbId, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentActivity {
    pub document_id: DbId,
    pub title: String,
    pub version_count: usize,
    pub contributor_count: usize,
    pub last_activity_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributorStats {
    pub actor_id: DbId,
    pub display_name: Option<String>,
    pub version_count: usize,
    pub first_contribution_at: Timestamp,
    pub last_contribution_at: Timestamp,
}

/// Share counts by derived lifecycle state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShareStatusCounts {
    pub pending: usize,
    pub active: usize,
    pub expired: usize,
    pub limit_reached: usize,
    pub revoked: usize,
}

impl ShareStatusCounts {
    fn add(&mut self, status: ShareStatus) {
        match status {
            ShareStatus::Pending => self.pending += 1,
            ShareStatus::Active => self.active += 1,
            ShareStatus::Expired => self.expired += 1,
            ShareStatus::LimitReached => self.limit_reached += 1,
            ShareStatus::Revoked => self.revoked += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollaborationStats {
    pub organization_id: DbId,
    pub total_documents: usize,
    pub total_versions: usize,
    pub total_shares: usize,
    pub recent_versions: usize,
    pub recent_shares: usize,
    pub recent_window_days: i64,
    pub shares_by_status: ShareStatusCounts,
    /// Mean lifetime over shares that have an expiration.
    pub average_share_lifetime_days: Option<f64>,
    pub top_documents: Vec<DocumentActivity>,
    pub generated_at: Timestamp,
}

pub struct CollaborationStatsAggregator {
    versions: Arc<dyn VersionStore>,
    shares: Arc<dyn ShareStore>,
    identities: Arc<dyn IdentityResolver>,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
}

impl CollaborationStatsAggregator {
    pub fn new(
        versions: Arc<dyn VersionStore>,
        shares: Arc<dyn ShareStore>,
        identities: Arc<dyn IdentityResolver>,
        clock: Arc<dyn Clock>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            versions,
            shares,
            identities,
            clock,
            config,
        }
    }

    pub async fn organization_stats(&self, organization_id: DbId) -> Result<CollaborationStats, CoreError> {
        let now = self.clock.now();
        let recent_since = now - Duration::days(self.config.recent_window_days);
        let timeout = self.config.store_timeout();

        let documents = bounded(timeout, "list_documents", self.versions.list_documents(organization_id)).await?;

        let mut total_versions = 0;
        let mut recent_versions = 0;
        let mut activity = Vec::with_capacity(documents.len());

        for document in &documents {
            let versions = bounded(timeout, "list_versions", self.versions.list_versions(document.id, None)).await?;
            total_versions += versions.len();
            recent_versions += versions.iter().filter(|v| v.created_at >= recent_since).count();

            let contributors: HashSet<DbId> = versions.iter().map(|v| v.created_by).collect();
            activity.push(DocumentActivity {
                document_id: document.id,
                title: document.title.clone(),
                version_count: versions.len(),
                contributor_count: contributors.len(),
                last_activity_at: versions.iter().map(|v| v.created_at).max(),
            });
        }
        rank_documents(&mut activity);
        activity.truncate(self.config.top_documents_limit);

        let shares = bounded(
            timeout,
            "list_shares_for_organization",
            self.shares.list_shares_for_organization(organization_id),
        )
        .await?;

        let mut shares_by_status = ShareStatusCounts::default();
        for share in &shares {
            shares_by_status.add(share.status(now));
        }
        let lifetimes: Vec<f64> = shares.iter().filter_map(|s| s.lifetime_days()).collect();
        let average_share_lifetime_days =
            (!lifetimes.is_empty()).then(|| lifetimes.iter().sum::<f64>() / lifetimes.len() as f64);

        Ok(CollaborationStats {
            organization_id,
            total_documents: documents.len(),
            total_versions,
            total_shares: shares.len(),
            recent_versions,
            recent_shares: shares.iter().filter(|s| s.created_at >= recent_since).count(),
            recent_window_days: self.config.recent_window_days,
            shares_by_status,
            average_share_lifetime_days,
            top_documents: activity,
            generated_at: now,
        })
    }

    /// Per-author version counts for one document, most prolific first.
    pub async fn document_contributors(&self, document_id: DbId) -> Result<Vec<ContributorStats>, CoreError> {
        let timeout = self.config.store_timeout();
        bounded(timeout, "load_document", self.versions.load_document(document_id))
            .await?
            .ok_or_else(|| CoreError::not_found("document", document_id))?;

        let versions = bounded(timeout, "list_versions", self.versions.list_versions(document_id, None)).await?;

        let mut by_actor: BTreeMap<DbId, (usize, Timestamp, Timestamp)> = BTreeMap::new();
        for version in &versions {
            by_actor
                .entry(version.created_by)
                .and_modify(|(count, first, last)| {
                    *count += 1;
                    *first = (*first).min(version.created_at);
                    *last = (*last).max(version.created_at);
                })
                .or_insert((1, version.created_at, version.created_at));
        }

        let mut contributors = Vec::with_capacity(by_actor.len());
        for (actor_id, (version_count, first, last)) in by_actor {
            let display_name = match bounded(timeout, "display_name", self.identities.display_name(actor_id)).await {
                Ok(name) => name,
                Err(e) => {
                    tracing::warn!(actor_id, error = %e, "Identity lookup failed");
                    None
                }
            };
            contributors.push(ContributorStats {
                actor_id,
                display_name,
                version_count,
                first_contribution_at: first,
                last_contribution_at: last,
            });
        }
        contributors.sort_by(|a, b| {
            b.version_count
                .cmp(&a.version_count)
                .then_with(|| a.actor_id.cmp(&b.actor_id))
        });
        Ok(contributors)
    }
}

/// Most versions first, then most distinct contributors, then lowest id.
fn rank_documents(activity: &mut [DocumentActivity]) {
    activity.sort_by(|a, b| {
        b.version_count
            .cmp(&a.version_count)
            .then_with(|| b.contributor_count.cmp(&a.contributor_count))
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(id: DbId, versions: usize, contributors: usize) -> DocumentActivity {
        DocumentActivity {
            document_id: id,
            title: format!("doc {id}"),
            version_count: versions,
            contributor_count: contributors,
            last_activity_at: None,
        }
    }

    #[test]
    fn ranking_breaks_ties_by_contributors_then_id() {
        let mut docs = vec![
            activity(3, 2, 1),
            activity(1, 5, 1),
            activity(4, 2, 2),
            activity(2, 2, 1),
        ];
        rank_documents(&mut docs);
        let ids: Vec<_> = docs.iter().map(|d| d.document_id).collect();
        assert_eq!(ids, vec![1, 4, 2, 3]);
    }

    #[test]
    fn status_counts_tally_each_state() {
        let mut counts = ShareStatusCounts::default();
        counts.add(ShareStatus::Active);
        counts.add(ShareStatus::Active);
        counts.add(ShareStatus::Revoked);
        assert_eq!(counts.active, 2);
        assert_eq!(counts.revoked, 1);
        assert_eq!(counts.expired, 0);
    }
}
