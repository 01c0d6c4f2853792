//! Translation of database failures into engine store errors.

use lexledger_core::store::StoreError;

/// A stored text column held a value the engine does not recognize.
#[derive(Debug, thiserror::Error)]
#[error("column '{column}' holds unexpected value '{value}'")]
pub struct UnexpectedValue {
    pub column: &'static str,
    pub value: String,
}

impl UnexpectedValue {
    pub fn new(column: &'static str, value: impl Into<String>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }
}

impl From<UnexpectedValue> for StoreError {
    fn from(err: UnexpectedValue) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Map a `sqlx` error onto the store taxonomy.
///
/// - unique violations become [`StoreError::Conflict`]
/// - pool exhaustion and I/O failures become [`StoreError::Connection`]
/// - everything else is a [`StoreError::Backend`]
pub fn into_store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Connection(err.to_string()),
        _ => StoreError::Backend(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_are_connection_errors() {
        let err = into_store_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Connection(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn missing_rows_are_backend_errors() {
        let err = into_store_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn unexpected_values_name_the_column() {
        let err: StoreError = UnexpectedValue::new("permission", "owner").into();
        assert_eq!(
            err.to_string(),
            "store error: column 'permission' holds unexpected value 'owner'"
        );
    }
}
