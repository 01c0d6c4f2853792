//! Secure share lifecycle: creation, gated access, downloads and revocation.
//!
//! Every rejected attempt leaves a failed row in the share's access log and
//! never touches the counters. Counters only move through the store's
//! conditional increments, so concurrent requests can never push a share
//! past its limits.

use std::sync::Arc;

use crate::audit::{AuditEventType, NewAuditEvent};
use crate::audit_trail::AuditTrailService;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::notify::{EventHook, Notification};
use crate::share::{
    generate_access_code, generate_slug, hash_access_code, sign_download_token, verify_download_token,
    AccessDenial, AccessGrant, AccessRequest, AccessType, CreatedShare, DownloadAuthorization,
    DownloadGrant, NewAccessLogEntry, NewShare, SecureShare, ShareAccessLogEntry, ShareConfig,
    ShareStatus,
};
use crate::store::{bounded, ShareStore, StoreError, VersionStore};
use crate::types::{DbId, Timestamp};

/// Default page size for access-log reads.
const ACCESS_LOG_DEFAULT_LIMIT: usize = 100;

pub struct SecureShareManager {
    shares: Arc<dyn ShareStore>,
    versions: Arc<dyn VersionStore>,
    audit: Arc<AuditTrailService>,
    hook: Arc<dyn EventHook>,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
}

impl SecureShareManager {
    pub fn new(
        shares: Arc<dyn ShareStore>,
        versions: Arc<dyn VersionStore>,
        audit: Arc<AuditTrailService>,
        hook: Arc<dyn EventHook>,
        clock: Arc<dyn Clock>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            shares,
            versions,
            audit,
            hook,
            clock,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Create a share for a document. The plaintext access code, when one
    /// is requested, is returned here and nowhere else.
    pub async fn create(&self, document_id: DbId, config: ShareConfig) -> Result<CreatedShare, CoreError> {
        let now = self.clock.now();
        config.validate(now)?;

        let document = bounded(
            self.config.store_timeout(),
            "load_document",
            self.versions.load_document(document_id),
        )
        .await?
        .ok_or_else(|| CoreError::not_found("document", document_id))?;

        let access_code = config.require_access_code.then(generate_access_code);
        let access_code_hash = access_code.as_deref().map(hash_access_code);

        let mut saved = None;
        for attempt in 1..=self.config.slug_generation_attempts {
            let new_share = NewShare {
                document_id,
                organization_id: document.organization_id,
                slug: generate_slug(),
                access_code_hash: access_code_hash.clone(),
                permission: config.permission,
                valid_from: config.valid_from.unwrap_or(now),
                expires_at: config.expires_at,
                allowed_views: config.allowed_views,
                allowed_downloads: config.allowed_downloads,
                allowed_ips: config.allowed_ips.iter().map(|ip| ip.trim().to_string()).collect(),
                requires_authentication: config.requires_authentication,
                created_by: config.created_by,
                created_at: now,
            };
            match bounded(self.config.store_timeout(), "save_share", self.shares.save_share(new_share)).await {
                Ok(share) => {
                    saved = Some(share);
                    break;
                }
                Err(StoreError::Conflict(detail)) => {
                    tracing::debug!(document_id, attempt, %detail, "Share slug collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        let share = saved.ok_or_else(|| {
            CoreError::Internal(format!(
                "Could not allocate a unique share slug after {} attempts",
                self.config.slug_generation_attempts
            ))
        })?;

        tracing::info!(
            share_id = share.id,
            document_id,
            permission = %share.permission,
            created_by = share.created_by,
            "Secure share created"
        );

        self.audit
            .record(
                NewAuditEvent::new(document_id, AuditEventType::Shared, format!("Share {} created", share.id))
                    .with_actor(share.created_by)
                    .with_metadata(serde_json::json!({
                        "share_id": share.id,
                        "permission": share.permission,
                        "expires_at": share.expires_at,
                        "allowed_views": share.allowed_views,
                        "allowed_downloads": share.allowed_downloads,
                        "requires_access_code": share.access_code_hash.is_some(),
                    })),
            )
            .await;

        self.hook.emit(Notification::ShareCreated {
            share_id: share.id,
            document_id,
            created_by: share.created_by,
            expires_at: share.expires_at,
        });

        Ok(CreatedShare { share, access_code })
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    /// View a shared document, consuming one view.
    pub async fn access(&self, slug: &str, request: AccessRequest) -> Result<AccessGrant, CoreError> {
        let now = self.clock.now();
        let share = self.load_by_slug(slug).await?;

        if let Err(denial) = share.check_access(now, &request) {
            return Err(self.deny(&share, denial, &request, now).await);
        }

        let updated = match bounded(
            self.config.store_timeout(),
            "try_increment_views",
            self.shares.try_increment_views(share.id),
        )
        .await?
        {
            Some(updated) => updated,
            None => {
                let denial = self.lost_race(&share, AccessDenial::ViewLimitExceeded).await?;
                return Err(self.deny(&share, denial, &request, now).await);
            }
        };

        self.log_access(NewAccessLogEntry::success(updated.id, AccessType::View, &request, now))
            .await;
        self.audit
            .record(
                NewAuditEvent::new(updated.document_id, AuditEventType::Viewed, format!("Viewed via share {}", updated.id))
                    .with_metadata(access_metadata(&updated, &request)),
            )
            .await;

        let download = (updated.permission.allows_download() && !updated.downloads_exhausted())
            .then(|| self.authorize_download(&updated, now));

        Ok(AccessGrant {
            share_id: updated.id,
            document_id: updated.document_id,
            permission: updated.permission,
            remaining_views: updated.remaining_views(),
            remaining_downloads: updated.remaining_downloads(),
            download,
        })
    }

    /// Download a shared document, consuming one download.
    pub async fn download(&self, slug: &str, request: AccessRequest) -> Result<DownloadGrant, CoreError> {
        let now = self.clock.now();
        let share = self.load_by_slug(slug).await?;

        if let Err(denial) = share.check_download(now, &request) {
            return Err(self.deny(&share, denial, &request, now).await);
        }

        let updated = match bounded(
            self.config.store_timeout(),
            "try_increment_downloads",
            self.shares.try_increment_downloads(share.id),
        )
        .await?
        {
            Some(updated) => updated,
            None => {
                let denial = self.lost_race(&share, AccessDenial::DownloadLimitExceeded).await?;
                return Err(self.deny(&share, denial, &request, now).await);
            }
        };

        self.log_access(NewAccessLogEntry::success(updated.id, AccessType::Download, &request, now))
            .await;
        self.audit
            .record(
                NewAuditEvent::new(
                    updated.document_id,
                    AuditEventType::Downloaded,
                    format!("Downloaded via share {}", updated.id),
                )
                .with_metadata(access_metadata(&updated, &request)),
            )
            .await;

        Ok(DownloadGrant {
            share_id: updated.id,
            document_id: updated.document_id,
            remaining_downloads: updated.remaining_downloads(),
            authorization: self.authorize_download(&updated, now),
        })
    }

    /// Check a download token and return the share it authorizes, provided
    /// the share has since been neither revoked nor expired.
    pub async fn verify_download_token(&self, token: &str) -> Result<SecureShare, CoreError> {
        let now = self.clock.now();
        let share_id = verify_download_token(token, now, &self.config.download_token_secret)?;
        let share = self.load_by_id(share_id).await?;
        if !share.is_active {
            return Err(AccessDenial::Revoked.into_error());
        }
        if share.is_expired(now) {
            return Err(AccessDenial::Expired.into_error());
        }
        Ok(share)
    }

    // -----------------------------------------------------------------------
    // Revocation and reads
    // -----------------------------------------------------------------------

    /// Revoke a share. Revoking an already revoked share returns it
    /// unchanged; the original revocation details are kept.
    pub async fn revoke(
        &self,
        share_id: DbId,
        revoked_by: DbId,
        reason: Option<&str>,
    ) -> Result<SecureShare, CoreError> {
        let now = self.clock.now();
        let revoked = bounded(
            self.config.store_timeout(),
            "revoke_share",
            self.shares.revoke(share_id, revoked_by, reason, now),
        )
        .await?;

        let Some(share) = revoked else {
            return self.load_by_id(share_id).await;
        };

        tracing::info!(share_id, document_id = share.document_id, revoked_by, "Secure share revoked");

        let description = match reason {
            Some(reason) => format!("Share {share_id} revoked: {reason}"),
            None => format!("Share {share_id} revoked"),
        };
        self.audit
            .record(
                NewAuditEvent::new(share.document_id, AuditEventType::ShareRevoked, description)
                    .with_actor(revoked_by)
                    .with_metadata(serde_json::json!({
                        "share_id": share_id,
                        "view_count": share.view_count,
                        "download_count": share.download_count,
                    })),
            )
            .await;

        self.hook.emit(Notification::ShareRevoked {
            share_id,
            document_id: share.document_id,
            revoked_by,
            reason: share.revocation_reason.clone(),
        });

        Ok(share)
    }

    /// Derived lifecycle state of a share right now.
    pub fn status(&self, share: &SecureShare) -> ShareStatus {
        share.status(self.clock.now())
    }

    pub async fn get(&self, share_id: DbId) -> Result<SecureShare, CoreError> {
        self.load_by_id(share_id).await
    }

    /// Access log of a share, newest first.
    pub async fn access_log(
        &self,
        share_id: DbId,
        limit: Option<usize>,
    ) -> Result<Vec<ShareAccessLogEntry>, CoreError> {
        self.load_by_id(share_id).await?;
        let limit = self.config.clamp_limit(limit, ACCESS_LOG_DEFAULT_LIMIT);
        Ok(bounded(
            self.config.store_timeout(),
            "list_access_log",
            self.shares.list_access_log(share_id, limit),
        )
        .await?)
    }

    pub async fn list_for_document(&self, document_id: DbId) -> Result<Vec<SecureShare>, CoreError> {
        Ok(bounded(
            self.config.store_timeout(),
            "list_shares_for_document",
            self.shares.list_shares_for_document(document_id),
        )
        .await?)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn load_by_slug(&self, slug: &str) -> Result<SecureShare, CoreError> {
        bounded(self.config.store_timeout(), "load_share", self.shares.load_share(slug))
            .await?
            .ok_or_else(|| CoreError::not_found("share", slug))
    }

    async fn load_by_id(&self, share_id: DbId) -> Result<SecureShare, CoreError> {
        bounded(
            self.config.store_timeout(),
            "load_share_by_id",
            self.shares.load_share_by_id(share_id),
        )
        .await?
        .ok_or_else(|| CoreError::not_found("share", share_id))
    }

    /// A conditional increment matched no row: the share was revoked or its
    /// budget was used up between the check and the update.
    async fn lost_race(&self, share: &SecureShare, exhausted: AccessDenial) -> Result<AccessDenial, CoreError> {
        let current = self.load_by_id(share.id).await?;
        Ok(if current.is_active {
            exhausted
        } else {
            AccessDenial::Revoked
        })
    }

    /// Record a refused attempt and turn the denial into the caller's error.
    async fn deny(
        &self,
        share: &SecureShare,
        denial: AccessDenial,
        request: &AccessRequest,
        now: Timestamp,
    ) -> CoreError {
        tracing::warn!(
            share_id = share.id,
            document_id = share.document_id,
            requester_ip = %request.requester_ip,
            reason = denial.reason(),
            "Share access denied"
        );
        self.log_access(NewAccessLogEntry::denied(share.id, denial, request, now))
            .await;
        denial.into_error()
    }

    async fn log_access(&self, entry: NewAccessLogEntry) {
        let share_id = entry.share_id;
        if let Err(e) = bounded(
            self.config.store_timeout(),
            "append_access_log",
            self.shares.append_access_log(entry),
        )
        .await
        {
            tracing::error!(error = %e, share_id, "Failed to append share access log entry");
        }
    }

    /// Tokens never outlive the share's own expiry.
    fn authorize_download(&self, share: &SecureShare, now: Timestamp) -> DownloadAuthorization {
        let ttl_end = now + chrono::Duration::seconds(self.config.download_token_ttl_secs);
        let expires_at = share.expires_at.map_or(ttl_end, |exp| exp.min(ttl_end));
        DownloadAuthorization {
            token: sign_download_token(share.id, expires_at, &self.config.download_token_secret),
            expires_at,
        }
    }
}

fn access_metadata(share: &SecureShare, request: &AccessRequest) -> serde_json::Value {
    serde_json::json!({
        "share_id": share.id,
        "requester_ip": request.requester_ip,
        "requester_identity": request.identity,
        "view_count": share.view_count,
        "download_count": share.download_count,
    })
}
