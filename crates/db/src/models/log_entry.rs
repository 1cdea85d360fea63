//! Append-only company change-log entry.

use serde::Serialize;
use sqlx::FromRow;
use tallysync_core::types::Timestamp;

/// One audit record from the `company_log` table. Entries are never
/// updated or deleted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CompanyLogEntry {
    pub log_id: i64,
    pub tally_company_number: String,
    /// Action tag, one of [`tallysync_core::types::actions`].
    pub action: String,
    pub details: Option<String>,
    pub timestamp: Option<Timestamp>,
}
