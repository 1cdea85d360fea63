//! The driver seam.
//!
//! The orchestrator and fetcher depend only on "run a query, read typed
//! rows"; [`TallyDriver`] is that capability as a trait so the engine can
//! be driven by the real ODBC implementation in production and by
//! in-process doubles in tests. Implementations open one connection per
//! call and release it on every exit path; connection reuse across calls
//! is unreliable with this driver and pooling is deliberately not used.

use std::time::Duration;

use async_trait::async_trait;
use tallysync_core::value::RawValue;

/// One result-set row: column names (as returned by the driver, usually
/// still carrying the `$` prefix) paired with raw cell values.
#[derive(Debug, Clone, Default)]
pub struct DriverRow {
    pub cells: Vec<(String, RawValue)>,
}

impl DriverRow {
    pub fn new(cells: Vec<(String, RawValue)>) -> Self {
        Self { cells }
    }
}

/// Driver configuration, passed in explicitly so tests can substitute
/// doubles and deployments can rename the data source.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Name of the local ODBC data source for the ledger system.
    pub dsn: String,
    /// Connect/login timeout for each driver call.
    pub timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            dsn: "TallyODBC64_9001".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The named data source does not exist. A configuration error: fatal,
    /// never retried.
    #[error("ODBC data source '{dsn}' not found; verify the driver configuration")]
    DsnNotFound { dsn: String },

    /// The external system is not running or not reachable. Recoverable;
    /// retried only on explicit user re-invocation.
    #[error("ledger system unreachable: {0}")]
    Unreachable(String),

    /// The driver call exceeded its bounded timeout.
    #[error("driver call timed out after {0:?}")]
    Timeout(Duration),

    /// The query failed against the current driver schema. Scoped to the
    /// collection being fetched, not the whole run.
    #[error("driver query failed: {0}")]
    Query(String),
}

impl DriverError {
    /// Whether retrying later could succeed without a config change.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DriverError::Unreachable(_) | DriverError::Timeout(_))
    }
}

/// Opaque query capability over the ledger system's ODBC surface.
#[async_trait]
pub trait TallyDriver: Send + Sync {
    /// Execute `query` and return every result row.
    ///
    /// Implementations own connection lifecycle: open per call, close on
    /// every path, bounded by the configured timeout.
    async fn query(&self, query: &str) -> Result<Vec<DriverRow>, DriverError>;
}
