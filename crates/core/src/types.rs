/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Version numbers start at 1 and are contiguous per document.
pub type VersionNumber = i32;

/// Sentinel for "no limit" on share view/download budgets.
pub const UNLIMITED: i64 = -1;
