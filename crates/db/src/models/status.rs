//! Per-company synchronization status.

use serde::Serialize;

/// Whether the last attempted master-data replication for a company
/// succeeded. Stored as TEXT with the human-readable display strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
pub enum SyncStatus {
    #[sqlx(rename = "Not Synced")]
    NotSynced,
    #[sqlx(rename = "Synced")]
    Synced,
    #[sqlx(rename = "Sync Failed")]
    SyncFailed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::NotSynced => "Not Synced",
            SyncStatus::Synced => "Synced",
            SyncStatus::SyncFailed => "Sync Failed",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
