//! Generic collection fetch: run the collection's query, map returned
//! columns through the field map, and normalize every cell.
//!
//! Column matching is case-insensitive with the driver's `$` prefix
//! stripped, and unmapped columns are ignored so schema drift on the
//! driver side stays forward-compatible. A cell that fails conversion
//! becomes null and is counted, never fatal.

use tallysync_core::registry::CollectionSpec;
use tallysync_core::value::{convert, Record};

use crate::driver::{DriverError, DriverRow, TallyDriver};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Fetch every row of a master-data collection.
pub async fn fetch_rows(
    driver: &dyn TallyDriver,
    spec: &CollectionSpec,
) -> Result<Vec<Record>, FetchError> {
    let query = spec.select_query();
    tracing::debug!(collection = spec.label, %query, "Fetching collection");

    let rows = driver.query(&query).await.map_err(|e| {
        log_driver_error(spec.label, &e);
        e
    })?;

    let mut records = Vec::with_capacity(rows.len());
    let mut conversion_warnings = 0usize;
    for row in &rows {
        records.push(map_row(spec, row, &mut conversion_warnings));
    }

    if conversion_warnings > 0 {
        tracing::warn!(
            collection = spec.label,
            conversion_warnings,
            "Some cells failed conversion and were nulled"
        );
    }
    tracing::info!(collection = spec.label, rows = records.len(), "Collection fetched");
    Ok(records)
}

/// Fetch the profile of the company currently loaded in the ledger system.
///
/// The driver always reflects whatever company is open there, not the one
/// the caller intends; hence the identity check the orchestrator performs
/// on the returned name.
pub async fn fetch_company_profile(
    driver: &dyn TallyDriver,
) -> Result<Option<Record>, FetchError> {
    fetch_single_row(driver, &tallysync_core::registry::COMPANY_PROFILE).await
}

/// Fetch license details of the ledger-system installation.
pub async fn fetch_license_info(driver: &dyn TallyDriver) -> Result<Option<Record>, FetchError> {
    fetch_single_row(driver, &tallysync_core::registry::LICENSE_INFO).await
}

async fn fetch_single_row(
    driver: &dyn TallyDriver,
    spec: &CollectionSpec,
) -> Result<Option<Record>, FetchError> {
    let mut records = fetch_rows(driver, spec).await?;
    if records.is_empty() {
        tracing::warn!(
            collection = spec.label,
            "Query returned no rows; is the external system running with a company open?"
        );
        return Ok(None);
    }
    Ok(Some(records.swap_remove(0)))
}

/// Map one driver row into a record of semantic keys.
fn map_row(spec: &CollectionSpec, row: &DriverRow, conversion_warnings: &mut usize) -> Record {
    let mut record = Record::with_capacity(spec.fields.len());
    for (column, raw) in &row.cells {
        let stripped = column.trim().trim_start_matches('$');
        let Some(field) = spec.field_for_column(stripped) else {
            tracing::debug!(collection = spec.label, column, "Ignoring unmapped column");
            continue;
        };
        let value = convert(raw, field.kind);
        if value.is_null() && !matches!(raw, tallysync_core::value::RawValue::Null) {
            // Non-empty input nulled out by conversion: worth counting.
            if !matches!(raw, tallysync_core::value::RawValue::Text(s) if s.trim().is_empty()) {
                *conversion_warnings += 1;
                tracing::warn!(
                    collection = spec.label,
                    column,
                    key = field.key,
                    "Cell failed conversion; storing null"
                );
            }
        }
        record.insert(field.key, value);
    }
    record
}

fn log_driver_error(label: &str, error: &DriverError) {
    match error {
        DriverError::DsnNotFound { .. } => {
            tracing::error!(collection = label, %error, "Fatal driver configuration error");
        }
        DriverError::Unreachable(_) | DriverError::Timeout(_) => {
            tracing::warn!(collection = label, %error, "Ledger system unavailable");
        }
        DriverError::Query(_) => {
            tracing::error!(collection = label, %error, "Collection query failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tallysync_core::registry::{COMPANY_PROFILE, MASTER_COLLECTIONS};
    use tallysync_core::value::{RawValue, Value};

    /// Test double returning canned rows and recording queries.
    struct FakeDriver {
        rows: Vec<DriverRow>,
        queries: Mutex<Vec<String>>,
        fail_with: Option<fn() -> DriverError>,
    }

    impl FakeDriver {
        fn with_rows(rows: Vec<DriverRow>) -> Self {
            Self { rows, queries: Mutex::new(Vec::new()), fail_with: None }
        }

        fn failing(fail_with: fn() -> DriverError) -> Self {
            Self { rows: Vec::new(), queries: Mutex::new(Vec::new()), fail_with: Some(fail_with) }
        }
    }

    #[async_trait]
    impl TallyDriver for FakeDriver {
        async fn query(&self, query: &str) -> Result<Vec<DriverRow>, DriverError> {
            self.queries.lock().unwrap().push(query.to_string());
            if let Some(f) = self.fail_with {
                return Err(f());
            }
            Ok(self.rows.clone())
        }
    }

    fn ledgers() -> &'static CollectionSpec {
        MASTER_COLLECTIONS.iter().find(|c| c.table == "tally_ledgers").unwrap()
    }

    fn cell(name: &str, value: &str) -> (String, RawValue) {
        (name.to_string(), RawValue::Text(value.to_string()))
    }

    #[tokio::test]
    async fn maps_prefixed_columns_case_insensitively() {
        let driver = FakeDriver::with_rows(vec![DriverRow::new(vec![
            cell("$GUID", "g-1"),
            cell("$name", "Cash"),
            cell("$OPENINGBALANCE", "150.25"),
        ])]);

        let records = fetch_rows(&driver, ledgers()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["tally_guid"], Value::Text("g-1".into()));
        assert_eq!(records[0]["tally_name"], Value::Text("Cash".into()));
        assert_eq!(records[0]["opening_balance"], Value::Real(150.25));
    }

    #[tokio::test]
    async fn unmapped_columns_are_ignored() {
        let driver = FakeDriver::with_rows(vec![DriverRow::new(vec![
            cell("$GUID", "g-1"),
            cell("$SomeFutureColumn", "whatever"),
        ])]);

        let records = fetch_rows(&driver, ledgers()).await.unwrap();
        assert_eq!(records[0].len(), 1);
        assert!(records[0].contains_key("tally_guid"));
    }

    #[tokio::test]
    async fn conversion_failure_nulls_the_cell_but_keeps_the_row() {
        let driver = FakeDriver::with_rows(vec![DriverRow::new(vec![
            cell("$GUID", "g-1"),
            cell("$OpeningBalance", "not-a-number"),
        ])]);

        let records = fetch_rows(&driver, ledgers()).await.unwrap();
        assert_eq!(records[0]["opening_balance"], Value::Null);
        assert_eq!(records[0]["tally_guid"], Value::Text("g-1".into()));
    }

    #[tokio::test]
    async fn boolean_tokens_are_normalized() {
        let driver = FakeDriver::with_rows(vec![DriverRow::new(vec![
            cell("$GUID", "g-1"),
            cell("$IsBillWiseOn", "Yes"),
            cell("$AffectsStock", "No"),
        ])]);

        let records = fetch_rows(&driver, ledgers()).await.unwrap();
        assert_eq!(records[0]["is_billwise_on"], Value::Bool(true));
        assert_eq!(records[0]["affects_stock"], Value::Bool(false));
    }

    #[tokio::test]
    async fn driver_errors_propagate_with_their_taxonomy() {
        let driver = FakeDriver::failing(|| DriverError::Unreachable("connection refused".into()));
        let err = fetch_rows(&driver, ledgers()).await.unwrap_err();
        let FetchError::Driver(inner) = err;
        assert!(inner.is_recoverable());
    }

    #[tokio::test]
    async fn profile_fetch_returns_first_row_or_none() {
        let driver = FakeDriver::with_rows(vec![DriverRow::new(vec![
            cell("$Name", "Acme Ltd"),
            cell("$Address", " 12 Main St "),
        ])]);
        let profile = fetch_company_profile(&driver).await.unwrap().unwrap();
        assert_eq!(profile["tally_company_name"], Value::Text("Acme Ltd".into()));
        assert_eq!(profile["address"], Value::Text("12 Main St".into()));

        let empty = FakeDriver::with_rows(Vec::new());
        assert!(fetch_company_profile(&empty).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn queries_are_built_from_the_spec() {
        let driver = FakeDriver::with_rows(Vec::new());
        fetch_rows(&driver, &COMPANY_PROFILE).await.unwrap();

        let queries = driver.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].contains("FROM HSp_CMPScreennColl"));
        assert!(queries[0].contains("$Name"));
    }
}
