//! Engine configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::error::CoreError;

/// Tunables for the version, share, audit and statistics services.
///
/// All fields have defaults suitable for local development. In production,
/// override via environment variables (see [`EngineConfig::from_env`]).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// A version is "major" when it changes more than this many fields.
    pub major_change_threshold: usize,
    /// History page size when the caller does not pass a limit.
    pub history_default_limit: usize,
    /// Upper bound on any history/audit/access-log page.
    pub max_page_size: usize,
    /// Deadline applied to every store call made by a service.
    pub store_timeout_secs: u64,
    /// Lifetime of a download authorization issued by a share.
    pub download_token_ttl_secs: i64,
    /// HMAC key for download authorization tokens.
    pub download_token_secret: String,
    /// Window used for "recent" counts in collaboration statistics.
    pub recent_window_days: i64,
    /// Number of documents in the statistics leaderboard.
    pub top_documents_limit: usize,
    /// How many fresh slugs to try before giving up on a collision.
    pub slug_generation_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            major_change_threshold: 5,
            history_default_limit: 50,
            max_page_size: 500,
            store_timeout_secs: 30,
            download_token_ttl_secs: 300,
            download_token_secret: "lexledger-dev-download-secret".into(),
            recent_window_days: 30,
            top_documents_limit: 10,
            slug_generation_attempts: 5,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                                  | Default |
    /// |------------------------------------------|---------|
    /// | `LEXLEDGER_MAJOR_CHANGE_THRESHOLD`       | `5`     |
    /// | `LEXLEDGER_HISTORY_DEFAULT_LIMIT`        | `50`    |
    /// | `LEXLEDGER_MAX_PAGE_SIZE`                | `500`   |
    /// | `LEXLEDGER_STORE_TIMEOUT_SECS`           | `30`    |
    /// | `LEXLEDGER_DOWNLOAD_TOKEN_TTL_SECS`      | `300`   |
    /// | `LEXLEDGER_DOWNLOAD_TOKEN_SECRET`        | dev key |
    /// | `LEXLEDGER_RECENT_WINDOW_DAYS`           | `30`    |
    /// | `LEXLEDGER_TOP_DOCUMENTS_LIMIT`          | `10`    |
    /// | `LEXLEDGER_SLUG_GENERATION_ATTEMPTS`     | `5`     |
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();

        let config = Self {
            major_change_threshold: env_or(
                "LEXLEDGER_MAJOR_CHANGE_THRESHOLD",
                defaults.major_change_threshold,
            )?,
            history_default_limit: env_or(
                "LEXLEDGER_HISTORY_DEFAULT_LIMIT",
                defaults.history_default_limit,
            )?,
            max_page_size: env_or("LEXLEDGER_MAX_PAGE_SIZE", defaults.max_page_size)?,
            store_timeout_secs: env_or("LEXLEDGER_STORE_TIMEOUT_SECS", defaults.store_timeout_secs)?,
            download_token_ttl_secs: env_or(
                "LEXLEDGER_DOWNLOAD_TOKEN_TTL_SECS",
                defaults.download_token_ttl_secs,
            )?,
            download_token_secret: std::env::var("LEXLEDGER_DOWNLOAD_TOKEN_SECRET")
                .unwrap_or(defaults.download_token_secret),
            recent_window_days: env_or("LEXLEDGER_RECENT_WINDOW_DAYS", defaults.recent_window_days)?,
            top_documents_limit: env_or(
                "LEXLEDGER_TOP_DOCUMENTS_LIMIT",
                defaults.top_documents_limit,
            )?,
            slug_generation_attempts: env_or(
                "LEXLEDGER_SLUG_GENERATION_ATTEMPTS",
                defaults.slug_generation_attempts,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load a `.env` file (if present) and then read the environment.
    pub fn from_dotenv() -> Result<Self, CoreError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Reject configurations the services cannot operate with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_page_size == 0 || self.history_default_limit == 0 {
            return Err(CoreError::Validation("Page sizes must be positive".into()));
        }
        if self.store_timeout_secs == 0 {
            return Err(CoreError::Validation(
                "Store timeout must be at least one second".into(),
            ));
        }
        if self.download_token_ttl_secs <= 0 {
            return Err(CoreError::Validation(
                "Download token TTL must be positive".into(),
            ));
        }
        if self.download_token_secret.len() < 16 {
            return Err(CoreError::Validation(
                "Download token secret must be at least 16 bytes".into(),
            ));
        }
        if self.recent_window_days <= 0 {
            return Err(CoreError::Validation(
                "Recent window must be at least one day".into(),
            ));
        }
        if self.slug_generation_attempts == 0 {
            return Err(CoreError::Validation(
                "Slug generation attempts must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Clamp a caller-supplied page size into `1..=max_page_size`.
    pub fn clamp_limit(&self, requested: Option<usize>, default: usize) -> usize {
        requested.unwrap_or(default).clamp(1, self.max_page_size)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, CoreError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("{key} has an invalid value '{raw}'"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn short_secret_rejected() {
        let config = EngineConfig {
            download_token_secret: "short".into(),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn clamp_limit_bounds_requests() {
        let config = EngineConfig::default();
        assert_eq!(config.clamp_limit(None, 50), 50);
        assert_eq!(config.clamp_limit(Some(0), 50), 1);
        assert_eq!(config.clamp_limit(Some(10_000), 50), 500);
    }

    #[test]
    fn env_or_parses_and_rejects() {
        std::env::set_var("LEXLEDGER_TEST_ENV_OR_OK", "42");
        std::env::set_var("LEXLEDGER_TEST_ENV_OR_BAD", "forty-two");
        assert_eq!(env_or::<usize>("LEXLEDGER_TEST_ENV_OR_OK", 1).unwrap(), 42);
        assert!(env_or::<usize>("LEXLEDGER_TEST_ENV_OR_BAD", 1).is_err());
        assert_eq!(env_or::<usize>("LEXLEDGER_TEST_ENV_OR_MISSING", 7).unwrap(), 7);
    }
}
