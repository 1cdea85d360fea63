//! Shared type aliases and well-known constants.

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Known action tags for `company_log` entries.
///
/// These must match the values stored in the `company_log.action` column.
/// The log is append-only; entries are never updated or deleted.
pub mod actions {
    pub const ADD: &str = "ADD";
    pub const EDIT: &str = "EDIT";
    pub const REACTIVATE: &str = "REACTIVATE";
    pub const SOFT_DELETE: &str = "SOFT_DELETE";
    pub const SYNC_SUCCESS: &str = "SYNC_SUCCESS";
    pub const SYNC_FAIL: &str = "SYNC_FAIL";
    pub const STATUS_UPDATE: &str = "STATUS_UPDATE";
}
