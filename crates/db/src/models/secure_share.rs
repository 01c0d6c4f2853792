//! `secure_shares` and `share_access_logs` rows.

use lexledger_core::share::{AccessType, PermissionLevel, SecureShare, ShareAccessLogEntry};
use lexledger_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use crate::error::UnexpectedValue;

#[derive(Debug, Clone, FromRow)]
pub struct SecureShareRow {
    pub id: DbId,
    pub document_id: DbId,
    pub organization_id: DbId,
    pub slug: String,
    pub access_code_hash: Option<String>,
    pub permission: String,
    pub valid_from: Timestamp,
    pub expires_at: Option<Timestamp>,
    pub allowed_views: i64,
    pub view_count: i64,
    pub allowed_downloads: i64,
    pub download_count: i64,
    pub allowed_ips: Vec<String>,
    pub requires_authentication: bool,
    pub is_active: bool,
    pub revoked_at: Option<Timestamp>,
    pub revoked_by: Option<DbId>,
    pub revocation_reason: Option<String>,
    pub created_by: DbId,
    pub created_at: Timestamp,
}

impl TryFrom<SecureShareRow> for SecureShare {
    type Error = UnexpectedValue;

    fn try_from(row: SecureShareRow) -> Result<Self, Self::Error> {
        let permission: PermissionLevel = row
            .permission
            .parse()
            .map_err(|_| UnexpectedValue::new("permission", &row.permission))?;

        Ok(Self {
            id: row.id,
            document_id: row.document_id,
            organization_id: row.organization_id,
            slug: row.slug,
            access_code_hash: row.access_code_hash,
            permission,
            valid_from: row.valid_from,
            expires_at: row.expires_at,
            allowed_views: row.allowed_views,
            view_count: row.view_count,
            allowed_downloads: row.allowed_downloads,
            download_count: row.download_count,
            allowed_ips: row.allowed_ips,
            requires_authentication: row.requires_authentication,
            is_active: row.is_active,
            revoked_at: row.revoked_at,
            revoked_by: row.revoked_by,
            revocation_reason: row.revocation_reason,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

/// One access attempt. Immutable once created.
#[derive(Debug, Clone, FromRow)]
pub struct ShareAccessLogRow {
    pub id: DbId,
    pub share_id: DbId,
    pub access_type: String,
    pub requester_ip: String,
    pub requester_identity: Option<String>,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
}

impl TryFrom<ShareAccessLogRow> for ShareAccessLogEntry {
    type Error = UnexpectedValue;

    fn try_from(row: ShareAccessLogRow) -> Result<Self, Self::Error> {
        let access_type: AccessType = row
            .access_type
            .parse()
            .map_err(|_| UnexpectedValue::new("access_type", &row.access_type))?;

        Ok(Self {
            id: row.id,
            share_id: row.share_id,
            access_type,
            requester_ip: row.requester_ip,
            requester_identity: row.requester_identity,
            success: row.success,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(permission: &str) -> SecureShareRow {
        SecureShareRow {
            id: 1,
            document_id: 2,
            organization_id: 3,
            slug: "abc".into(),
            access_code_hash: None,
            permission: permission.into(),
            valid_from: Utc::now(),
            expires_at: None,
            allowed_views: -1,
            view_count: 0,
            allowed_downloads: -1,
            download_count: 0,
            allowed_ips: vec!["10.0.0.1".into()],
            requires_authentication: false,
            is_active: true,
            revoked_at: None,
            revoked_by: None,
            revocation_reason: None,
            created_by: 4,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn known_permission_converts() {
        let share = SecureShare::try_from(row("download")).unwrap();
        assert_eq!(share.permission, PermissionLevel::Download);
        assert_eq!(share.allowed_ips, vec!["10.0.0.1".to_string()]);
    }

    #[test]
    fn unknown_permission_is_rejected() {
        let err = SecureShare::try_from(row("owner")).unwrap_err();
        assert_eq!(err.column, "permission");
    }
}
