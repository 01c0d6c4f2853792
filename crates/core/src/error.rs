use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with key {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    /// Transient store failure (timeout, connection loss, write conflict).
    /// Never retried inside the engine; the caller owns retry policy.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a [`CoreError::NotFound`] keyed by anything displayable.
    pub fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Returns `true` for failures the caller may retry unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_transient())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_formats_entity_and_key() {
        let err = CoreError::not_found("share", "abc");
        assert_eq!(err.to_string(), "Entity not found: share with key abc");
    }

    #[test]
    fn timeouts_are_transient() {
        let err = CoreError::from(StoreError::Timeout { operation: "load_share" });
        assert!(err.is_transient());
        assert!(!CoreError::Validation("x".into()).is_transient());
    }
}
