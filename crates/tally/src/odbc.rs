//! Production [`TallyDriver`] over the platform ODBC driver manager.
//!
//! One environment + connection per call: the ledger system's driver is
//! single-tenant and connection reuse across calls is unreliable, so no
//! pooling. Cells are read in text mode and surfaced as raw text; the
//! value converter downstream normalizes types, which also absorbs the
//! driver's habit of returning numerics and booleans as strings.

use async_trait::async_trait;
use odbc_api::{buffers::TextRowSet, ConnectionOptions, Cursor, Environment, ResultSetMetadata};
use tallysync_core::value::RawValue;

use crate::driver::{DriverConfig, DriverError, DriverRow, TallyDriver};

/// Rows fetched per buffer batch.
const BATCH_SIZE: usize = 256;

/// Upper bound on a single text cell; longer values are truncated by the
/// buffer allocation.
const MAX_CELL_BYTES: usize = 4096;

pub struct OdbcDriver {
    config: DriverConfig,
}

impl OdbcDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TallyDriver for OdbcDriver {
    async fn query(&self, query: &str) -> Result<Vec<DriverRow>, DriverError> {
        let config = self.config.clone();
        let query = query.to_string();
        // The ODBC API is blocking; keep it off the async worker thread.
        tokio::task::spawn_blocking(move || run_query(&config, &query))
            .await
            .map_err(|e| DriverError::Query(format!("driver task failed: {e}")))?
    }
}

fn run_query(config: &DriverConfig, query: &str) -> Result<Vec<DriverRow>, DriverError> {
    let environment =
        Environment::new().map_err(|e| DriverError::Query(format!("ODBC environment: {e}")))?;

    let options = ConnectionOptions {
        login_timeout_sec: Some(config.timeout.as_secs() as u32),
        ..ConnectionOptions::default()
    };

    let connection = environment
        .connect(&config.dsn, "", "", options)
        .map_err(|e| classify_connect_error(&config.dsn, config, e))?;

    let Some(mut cursor) = connection
        .execute(query, ())
        .map_err(|e| DriverError::Query(e.to_string()))?
    else {
        return Ok(Vec::new());
    };

    let column_names: Vec<String> = cursor
        .column_names()
        .map_err(|e| DriverError::Query(e.to_string()))?
        .collect::<Result<_, _>>()
        .map_err(|e| DriverError::Query(e.to_string()))?;

    let mut buffers = TextRowSet::for_cursor(BATCH_SIZE, &mut cursor, Some(MAX_CELL_BYTES))
        .map_err(|e| DriverError::Query(e.to_string()))?;
    let mut row_set_cursor = cursor
        .bind_buffer(&mut buffers)
        .map_err(|e| DriverError::Query(e.to_string()))?;

    let mut rows = Vec::new();
    while let Some(batch) = row_set_cursor
        .fetch()
        .map_err(|e| DriverError::Query(e.to_string()))?
    {
        for row_index in 0..batch.num_rows() {
            let cells = column_names
                .iter()
                .enumerate()
                .map(|(col_index, name)| {
                    let raw = match batch.at(col_index, row_index) {
                        Some(bytes) => {
                            RawValue::Text(String::from_utf8_lossy(bytes).into_owned())
                        }
                        None => RawValue::Null,
                    };
                    (name.clone(), raw)
                })
                .collect();
            rows.push(DriverRow::new(cells));
        }
    }

    // Connection and environment drop here, releasing the handle on every
    // path including the early error returns above.
    Ok(rows)
}

/// Map a connect-time failure onto the driver error taxonomy using the
/// SQLSTATE embedded in the diagnostic text: IM002 means the data source
/// name is not configured, 08xxx means the server is unreachable, HYT
/// states are timeouts.
fn classify_connect_error(dsn: &str, config: &DriverConfig, error: odbc_api::Error) -> DriverError {
    let text = error.to_string();
    if text.contains("IM002") {
        DriverError::DsnNotFound { dsn: dsn.to_string() }
    } else if text.contains("HYT00") || text.contains("HYT01") {
        DriverError::Timeout(config.timeout)
    } else if ["08001", "08S01", "08004", "08007"].iter().any(|s| text.contains(s)) {
        DriverError::Unreachable(text)
    } else {
        DriverError::Query(text)
    }
}
