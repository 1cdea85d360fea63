//! The sync orchestrator: one worker task per company sync run, ordered
//! progress messages over a single consumer channel, and a busy guard that
//! rejects re-entrant runs for the same company.

pub mod engine;
pub mod messages;

pub use engine::{EngineError, SyncEngine};
pub use messages::SyncMessage;
