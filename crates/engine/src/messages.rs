//! Message algebra for sync progress reporting.
//!
//! The worker emits messages in order on one channel; the consumer polls
//! on its own schedule and may see zero or many messages per poll. A run
//! produces progress messages with strictly increasing step numbers, at
//! most one error summary, and exactly one terminal [`SyncMessage::Finished`].

use tallysync_db::models::status::SyncStatus;

#[derive(Debug, Clone, PartialEq)]
pub enum SyncMessage {
    /// One pipeline step is starting.
    Progress {
        /// 1-based step index; step 1 is the company profile.
        step: usize,
        total: usize,
        label: String,
    },

    /// Human-readable summary of a fatal run error. Per-collection
    /// failures do not surface here; they go to the logs only.
    Error(String),

    /// Terminal message; the channel closes after it.
    Finished {
        status: SyncStatus,
        /// Number of master-data collections that wrote at least one row.
        collections_synced: usize,
    },
}
