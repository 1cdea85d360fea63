//! Company entity model.

use serde::Serialize;
use sqlx::FromRow;
use tallysync_core::types::Timestamp;

use crate::models::status::SyncStatus;

/// A company row from the `companies` table, base and sync columns only.
///
/// The ~40 optional profile/license columns are written wholesale by a
/// profile sync and read back by targeted queries; they are not part of
/// the listing model.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Company {
    pub id: i64,
    /// External identifier assigned by the ledger system; unique and
    /// immutable once assigned, across active and soft-deleted rows.
    pub tally_company_number: String,
    pub tally_company_name: String,
    pub description: Option<String>,
    /// Soft-delete flag; inactive rows retain their data and identifier.
    pub is_active: bool,
    pub sync_status: SyncStatus,
    pub last_sync_timestamp: Option<Timestamp>,
}
