//! Secure external shares: value types, derived state and access checks.
//!
//! Everything here is pure. Persistence and the atomic counter updates live
//! behind [`crate::store::ShareStore`]; orchestration (logging attempts,
//! auditing, notifications) lives in [`crate::share_manager`].

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hashing;
use crate::types::{DbId, Timestamp, UNLIMITED};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of a share slug.
pub const SLUG_LENGTH: usize = 32;

/// Slug alphabet: ASCII letters and digits minus the visually ambiguous
/// `0`, `O`, `1`, `l` and `I`.
pub const SLUG_ALPHABET: &[u8] =
    b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789";

/// Number of digits in a generated access code.
pub const ACCESS_CODE_LENGTH: usize = 6;

// ---------------------------------------------------------------------------
// Permission level
// ---------------------------------------------------------------------------

/// What an external accessor may do with a shared document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    ViewOnly,
    Download,
    Comment,
    Edit,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewOnly => "view_only",
            Self::Download => "download",
            Self::Comment => "comment",
            Self::Edit => "edit",
        }
    }

    /// Only `download` and `edit` shares may fetch the file.
    pub fn allows_download(&self) -> bool {
        matches!(self, Self::Download | Self::Edit)
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view_only" => Ok(Self::ViewOnly),
            "download" => Ok(Self::Download),
            "comment" => Ok(Self::Comment),
            "edit" => Ok(Self::Edit),
            other => Err(CoreError::Validation(format!(
                "Unknown permission level '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Share
// ---------------------------------------------------------------------------

/// A persisted share. Counters only grow; `is_active` goes true→false once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecureShare {
    pub id: DbId,
    pub document_id: DbId,
    pub organization_id: DbId,
    pub slug: String,
    /// SHA-256 hex of the access code; the plaintext is never stored.
    #[serde(skip_serializing)]
    pub access_code_hash: Option<String>,
    pub permission: PermissionLevel,
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

/// Derived lifecycle state of a share at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareStatus {
    /// Created but `valid_from` is still in the future.
    Pending,
    Active,
    Expired,
    LimitReached,
    Revoked,
}

impl ShareStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::LimitReached => "limit_reached",
            Self::Revoked => "revoked",
        }
    }
}

impl SecureShare {
    /// Lifecycle state at `now`. Revocation wins over every derived state.
    pub fn status(&self, now: Timestamp) -> ShareStatus {
        if !self.is_active {
            ShareStatus::Revoked
        } else if self.is_expired(now) {
            ShareStatus::Expired
        } else if now < self.valid_from {
            ShareStatus::Pending
        } else if self.views_exhausted() {
            ShareStatus::LimitReached
        } else {
            ShareStatus::Active
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }

    pub fn views_exhausted(&self) -> bool {
        self.allowed_views != UNLIMITED && self.view_count >= self.allowed_views
    }

    pub fn downloads_exhausted(&self) -> bool {
        self.allowed_downloads != UNLIMITED && self.download_count >= self.allowed_downloads
    }

    /// Views left, or `None` when unlimited.
    pub fn remaining_views(&self) -> Option<i64> {
        remaining(self.allowed_views, self.view_count)
    }

    /// Downloads left, or `None` when unlimited.
    pub fn remaining_downloads(&self) -> Option<i64> {
        remaining(self.allowed_downloads, self.download_count)
    }

    /// Lifetime in fractional days, when an expiration is set.
    pub fn lifetime_days(&self) -> Option<f64> {
        self.expires_at
            .map(|exp| (exp - self.valid_from).num_seconds() as f64 / 86_400.0)
    }

    /// Run the ordered access checks shared by views and downloads.
    ///
    /// Order: revoked, validity window, view budget, access code, IP
    /// allow-list, authentication. The first failing check is reported.
    pub fn check_access(&self, now: Timestamp, request: &AccessRequest) -> Result<(), AccessDenial> {
        if !self.is_active {
            return Err(AccessDenial::Revoked);
        }
        if now < self.valid_from {
            return Err(AccessDenial::NotYetValid);
        }
        if self.is_expired(now) {
            return Err(AccessDenial::Expired);
        }
        if self.views_exhausted() {
            return Err(AccessDenial::ViewLimitExceeded);
        }
        if let Some(expected) = &self.access_code_hash {
            let supplied = request
                .access_code
                .as_deref()
                .map(|code| hash_access_code(code.trim()));
            match supplied {
                Some(hash) if hashing::constant_time_eq(&hash, expected) => {}
                _ => return Err(AccessDenial::InvalidAccessCode),
            }
        }
        if !ip_permitted(&self.allowed_ips, &request.requester_ip) {
            return Err(AccessDenial::IpNotPermitted);
        }
        if self.requires_authentication
            && request
                .identity
                .as_deref()
                .is_none_or(|id| id.trim().is_empty())
        {
            return Err(AccessDenial::AuthenticationRequired);
        }
        Ok(())
    }

    /// [`check_access`](Self::check_access) plus permission level and
    /// download budget.
    pub fn check_download(
        &self,
        now: Timestamp,
        request: &AccessRequest,
    ) -> Result<(), AccessDenial> {
        self.check_access(now, request)?;
        if !self.permission.allows_download() {
            return Err(AccessDenial::DownloadNotPermitted);
        }
        if self.downloads_exhausted() {
            return Err(AccessDenial::DownloadLimitExceeded);
        }
        Ok(())
    }
}

fn remaining(allowed: i64, used: i64) -> Option<i64> {
    (allowed != UNLIMITED).then(|| (allowed - used).max(0))
}

/// An empty allow-list admits everyone. Otherwise the requester must parse
/// as an IP address equal to one of the entries.
fn ip_permitted(allowed: &[String], requester: &str) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let Ok(requester) = requester.trim().parse::<IpAddr>() else {
        return false;
    };
    allowed
        .iter()
        .filter_map(|entry| entry.trim().parse::<IpAddr>().ok())
        .any(|ip| ip == requester)
}

// ---------------------------------------------------------------------------
// Denials
// ---------------------------------------------------------------------------

/// Why an access attempt was refused. Recorded verbatim in the access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDenial {
    Revoked,
    NotYetValid,
    Expired,
    ViewLimitExceeded,
    InvalidAccessCode,
    IpNotPermitted,
    AuthenticationRequired,
    DownloadNotPermitted,
    DownloadLimitExceeded,
}

impl AccessDenial {
    /// Reason string stored in the access log and carried by the error.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Revoked => "revoked",
            Self::NotYetValid => "expired: share is not yet valid",
            Self::Expired => "expired",
            Self::ViewLimitExceeded => "view limit exceeded",
            Self::InvalidAccessCode => "invalid access code",
            Self::IpNotPermitted => "IP not permitted",
            Self::AuthenticationRequired => "authentication required",
            Self::DownloadNotPermitted => "download not permitted for this share",
            Self::DownloadLimitExceeded => "download limit exceeded",
        }
    }

    /// Authentication and permission-level failures are permission errors;
    /// everything else is a validation error.
    pub fn into_error(self) -> CoreError {
        match self {
            Self::AuthenticationRequired | Self::DownloadNotPermitted => {
                CoreError::Permission(self.reason().to_string())
            }
            _ => CoreError::Validation(self.reason().to_string()),
        }
    }
}

impl fmt::Display for AccessDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

// ---------------------------------------------------------------------------
// Creation input
// ---------------------------------------------------------------------------

/// Caller-supplied configuration for a new share.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareConfig {
    pub permission: PermissionLevel,
    /// Defaults to the creation instant.
    pub valid_from: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    #[serde(default = "unlimited")]
    pub allowed_views: i64,
    #[serde(default = "unlimited")]
    pub allowed_downloads: i64,
    #[serde(default)]
    pub allowed_ips: Vec<String>,
    #[serde(default)]
    pub requires_authentication: bool,
    /// Generate a numeric access code that accessors must present.
    #[serde(default)]
    pub require_access_code: bool,
    pub created_by: DbId,
}

fn unlimited() -> i64 {
    UNLIMITED
}

impl ShareConfig {
    /// A view-only, unlimited, unrestricted share.
    pub fn view_only(created_by: DbId) -> Self {
        Self {
            permission: PermissionLevel::ViewOnly,
            valid_from: None,
            expires_at: None,
            allowed_views: UNLIMITED,
            allowed_downloads: UNLIMITED,
            allowed_ips: Vec::new(),
            requires_authentication: false,
            require_access_code: false,
            created_by,
        }
    }

    /// Validate limits, the validity window and the IP allow-list.
    pub fn validate(&self, now: Timestamp) -> Result<(), CoreError> {
        validate_limit("allowed_views", self.allowed_views)?;
        validate_limit("allowed_downloads", self.allowed_downloads)?;

        let valid_from = self.valid_from.unwrap_or(now);
        if let Some(expires_at) = self.expires_at {
            if expires_at <= valid_from {
                return Err(CoreError::Validation(
                    "expires_at must be later than valid_from".into(),
                ));
            }
        }

        for entry in &self.allowed_ips {
            if entry.trim().parse::<IpAddr>().is_err() {
                return Err(CoreError::Validation(format!(
                    "'{entry}' is not a valid IP address"
                )));
            }
        }
        Ok(())
    }
}

fn validate_limit(field: &str, value: i64) -> Result<(), CoreError> {
    if value == UNLIMITED || value >= 1 {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{field} must be -1 (unlimited) or at least 1, got {value}"
        )))
    }
}

/// Fully-formed share handed to [`crate::store::ShareStore::save_share`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewShare {
    pub document_id: DbId,
    pub organization_id: DbId,
    pub slug: String,
    pub access_code_hash: Option<String>,
    pub permission: PermissionLevel,
    pub valid_from: Timestamp,
    pub expires_at: Option<Timestamp>,
    pub allowed_views: i64,
    pub allowed_downloads: i64,
    pub allowed_ips: Vec<String>,
    pub requires_authentication: bool,
    pub created_by: DbId,
    pub created_at: Timestamp,
}

/// Result of creating a share. `access_code` is the only time the plaintext
/// code is ever available.
#[derive(Debug, Clone)]
pub struct CreatedShare {
    pub share: SecureShare,
    pub access_code: Option<String>,
}

// ---------------------------------------------------------------------------
// Access requests and results
// ---------------------------------------------------------------------------

/// Who is knocking, and with what.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessRequest {
    pub access_code: Option<String>,
    pub requester_ip: String,
    /// Identity established by the caller's authentication layer, if any.
    pub identity: Option<String>,
}

impl AccessRequest {
    pub fn from_ip(ip: impl Into<String>) -> Self {
        Self {
            requester_ip: ip.into(),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.access_code = Some(code.into());
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }
}

/// Time-boxed authorization to fetch the shared file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadAuthorization {
    pub token: String,
    pub expires_at: Timestamp,
}

/// Successful view.
#[derive(Debug, Clone, Serialize)]
pub struct AccessGrant {
    pub share_id: DbId,
    pub document_id: DbId,
    pub permission: PermissionLevel,
    pub remaining_views: Option<i64>,
    pub remaining_downloads: Option<i64>,
    pub download: Option<DownloadAuthorization>,
}

/// Successful download.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadGrant {
    pub share_id: DbId,
    pub document_id: DbId,
    pub remaining_downloads: Option<i64>,
    pub authorization: DownloadAuthorization,
}

// ---------------------------------------------------------------------------
// Access log
// ---------------------------------------------------------------------------

/// Kind of access recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    View,
    Download,
    Denied,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Download => "download",
            Self::Denied => "denied",
        }
    }
}

impl FromStr for AccessType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Self::View),
            "download" => Ok(Self::Download),
            "denied" => Ok(Self::Denied),
            other => Err(CoreError::Validation(format!("Unknown access type '{other}'"))),
        }
    }
}

/// One append-only access log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareAccessLogEntry {
    pub id: DbId,
    pub share_id: DbId,
    pub access_type: AccessType,
    pub requester_ip: String,
    pub requester_identity: Option<String>,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
}

/// Input for [`crate::store::ShareStore::append_access_log`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccessLogEntry {
    pub share_id: DbId,
    pub access_type: AccessType,
    pub requester_ip: String,
    pub requester_identity: Option<String>,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
}

impl NewAccessLogEntry {
    pub fn success(
        share_id: DbId,
        access_type: AccessType,
        request: &AccessRequest,
        at: Timestamp,
    ) -> Self {
        Self {
            share_id,
            access_type,
            requester_ip: request.requester_ip.clone(),
            requester_identity: request.identity.clone(),
            success: true,
            failure_reason: None,
            created_at: at,
        }
    }

    pub fn denied(share_id: DbId, denial: AccessDenial, request: &AccessRequest, at: Timestamp) -> Self {
        Self {
            share_id,
            access_type: AccessType::Denied,
            requester_ip: request.requester_ip.clone(),
            requester_identity: request.identity.clone(),
            success: false,
            failure_reason: Some(denial.reason().to_string()),
            created_at: at,
        }
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// Generate a random slug of [`SLUG_LENGTH`] characters from [`SLUG_ALPHABET`].
pub fn generate_slug() -> String {
    let mut rng = rand::rng();
    (0..SLUG_LENGTH)
        .map(|_| SLUG_ALPHABET[rng.random_range(0..SLUG_ALPHABET.len())] as char)
        .collect()
}

/// Generate a zero-padded numeric access code of [`ACCESS_CODE_LENGTH`] digits.
pub fn generate_access_code() -> String {
    let mut rng = rand::rng();
    (0..ACCESS_CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Hash an access code for storage and comparison.
pub fn hash_access_code(code: &str) -> String {
    hashing::sha256_hex(code.as_bytes())
}

/// Sign a download authorization as `"{share_id}.{expires_unix}.{hmac}"`.
pub fn sign_download_token(share_id: DbId, expires_at: Timestamp, secret: &str) -> String {
    let payload = format!("{share_id}.{}", expires_at.timestamp());
    let signature = hashing::hmac_sha256_hex(secret.as_bytes(), payload.as_bytes());
    format!("{payload}.{signature}")
}

/// Verify a download token, returning the share id it authorizes.
pub fn verify_download_token(token: &str, now: Timestamp, secret: &str) -> Result<DbId, CoreError> {
    let invalid = || CoreError::Validation("invalid download token".into());

    let mut parts = token.splitn(3, '.');
    let (Some(id), Some(exp), Some(signature)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    let share_id: DbId = id.parse().map_err(|_| invalid())?;
    let expires_unix: i64 = exp.parse().map_err(|_| invalid())?;

    let payload = format!("{share_id}.{expires_unix}");
    let expected = hashing::hmac_sha256_hex(secret.as_bytes(), payload.as_bytes());
    if !hashing::constant_time_eq(&expected, signature) {
        return Err(invalid());
    }
    if now.timestamp() > expires_unix {
        return Err(CoreError::Validation("download token expired".into()));
    }
    Ok(share_id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
