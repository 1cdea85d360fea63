//! Integration tests for the sync orchestrator.
//!
//! Drives full runs against an in-memory database and an in-process fake
//! driver to verify:
//! - An identity mismatch aborts before any collection fetch
//! - A single collection failure does not abort the run
//! - The busy guard rejects a concurrent run for the same company
//! - Progress messages arrive in order with exactly one terminal message

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Semaphore;

use tallysync_core::registry::{CollectionSpec, MASTER_COLLECTIONS};
use tallysync_core::value::{FieldKind, RawValue};
use tallysync_db::models::status::SyncStatus;
use tallysync_db::repositories::CompanyRepo;
use tallysync_db::schema::ensure_schema;
use tallysync_db::DbPool;
use tallysync_engine::{EngineError, SyncEngine, SyncMessage};
use tallysync_tally::driver::{DriverError, DriverRow, TallyDriver};

// ---------------------------------------------------------------------------
// Fake driver
// ---------------------------------------------------------------------------

/// Test double: answers the profile/license queries with canned data and
/// every master collection with one synthetic row.
struct FakeDriver {
    profile_name: String,
    with_license: bool,
    fail_sources: HashSet<&'static str>,
    queries: Mutex<Vec<String>>,
    /// When set, every query must first acquire a permit; lets a test hold
    /// a run open to observe the busy guard.
    gate: Option<Arc<Semaphore>>,
}

impl FakeDriver {
    fn for_company(name: &str) -> Self {
        Self {
            profile_name: name.to_string(),
            with_license: false,
            fail_sources: HashSet::new(),
            queries: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

/// Build one plausible row for a collection: every declared field gets a
/// convertible text value, with the unique key made distinct per source.
fn synthetic_row(spec: &CollectionSpec) -> DriverRow {
    let cells = spec
        .fields
        .iter()
        .map(|field| {
            let value = if field.key == spec.unique_key {
                format!("{}-1", spec.table)
            } else {
                match field.kind {
                    FieldKind::Boolean => "Yes".to_string(),
                    FieldKind::Integer => "7".to_string(),
                    FieldKind::Real => "1.5".to_string(),
                    FieldKind::Date => "20230401".to_string(),
                    FieldKind::Text => format!("{}-text", field.key),
                }
            };
            (format!("${}", field.column), RawValue::Text(value))
        })
        .collect();
    DriverRow::new(cells)
}

#[async_trait]
impl TallyDriver for FakeDriver {
    async fn query(&self, query: &str) -> Result<Vec<DriverRow>, DriverError> {
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }
        self.queries.lock().unwrap().push(query.to_string());

        let source = query.rsplit("FROM ").next().unwrap_or_default().trim();
        if source == "HSp_CMPScreennColl" {
            return Ok(vec![DriverRow::new(vec![
                ("$Name".into(), RawValue::Text(self.profile_name.clone())),
                ("$Address".into(), RawValue::Text("12 Main St".into())),
                ("$DecimalPlaces".into(), RawValue::Text("2".into())),
            ])]);
        }
        if source == "HSPTallyLicensecoll" {
            if self.with_license {
                return Ok(vec![DriverRow::new(vec![
                    ("$TallySerialNo".into(), RawValue::Text("SN-777".into())),
                    ("$TallyIsGold".into(), RawValue::Text("Yes".into())),
                ])]);
            }
            return Ok(Vec::new());
        }
        if self.fail_sources.contains(source) {
            return Err(DriverError::Query(format!("collection {source} exploded")));
        }

        let spec = MASTER_COLLECTIONS
            .iter()
            .find(|c| c.source == source)
            .unwrap_or_else(|| panic!("unexpected query source {source}"));
        Ok(vec![synthetic_row(spec)])
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn pool() -> DbPool {
    let pool = tallysync_db::connect_memory().await.expect("pool");
    ensure_schema(&pool).await.expect("schema");
    pool
}

async fn drain(mut rx: UnboundedReceiver<SyncMessage>) -> Vec<SyncMessage> {
    let mut messages = Vec::new();
    while let Some(message) = rx.recv().await {
        messages.push(message);
    }
    messages
}

async fn table_count(pool: &DbPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn status_of(pool: &DbPool, number: &str) -> SyncStatus {
    CompanyRepo::find_by_number(pool, number)
        .await
        .unwrap()
        .unwrap()
        .sync_status
}

// ---------------------------------------------------------------------------
// Test: happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_full_run_syncs_profile_and_all_collections() {
    let pool = pool().await;
    CompanyRepo::add(&pool, "Acme Ltd", "1001", "").await.unwrap();

    let engine = SyncEngine::new(pool.clone(), Arc::new(FakeDriver::for_company("Acme Ltd")));
    let messages = drain(engine.start("1001", "Acme Ltd").unwrap()).await;

    assert_eq!(status_of(&pool, "1001").await, SyncStatus::Synced);
    assert_matches!(
        messages.last(),
        Some(SyncMessage::Finished { status: SyncStatus::Synced, collections_synced }) if *collections_synced == MASTER_COLLECTIONS.len()
    );

    for spec in MASTER_COLLECTIONS {
        assert_eq!(table_count(&pool, spec.table).await, 1, "table {}", spec.table);
    }

    let address: Option<String> =
        sqlx::query_scalar("SELECT address FROM companies WHERE tally_company_number = '1001'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(address.as_deref(), Some("12 Main St"));
}

#[tokio::test]
async fn test_progress_messages_are_ordered_with_one_terminal() {
    let pool = pool().await;
    CompanyRepo::add(&pool, "Acme Ltd", "1001", "").await.unwrap();

    let engine = SyncEngine::new(pool.clone(), Arc::new(FakeDriver::for_company("Acme Ltd")));
    let messages = drain(engine.start("1001", "Acme Ltd").unwrap()).await;

    let steps: Vec<usize> = messages
        .iter()
        .filter_map(|m| match m {
            SyncMessage::Progress { step, .. } => Some(*step),
            _ => None,
        })
        .collect();
    let expected: Vec<usize> = (1..=MASTER_COLLECTIONS.len() + 1).collect();
    assert_eq!(steps, expected, "progress steps strictly increasing");

    let finished = messages
        .iter()
        .filter(|m| matches!(m, SyncMessage::Finished { .. }))
        .count();
    assert_eq!(finished, 1, "exactly one terminal message");
    assert_matches!(messages.last(), Some(SyncMessage::Finished { .. }));
}

#[tokio::test]
async fn test_license_fields_are_merged_into_the_profile() {
    let pool = pool().await;
    CompanyRepo::add(&pool, "Acme Ltd", "1001", "").await.unwrap();

    let mut driver = FakeDriver::for_company("Acme Ltd");
    driver.with_license = true;
    let engine = SyncEngine::new(pool.clone(), Arc::new(driver));
    drain(engine.start("1001", "Acme Ltd").unwrap()).await;

    let serial: Option<String> = sqlx::query_scalar(
        "SELECT serial_number FROM companies WHERE tally_company_number = '1001'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(serial.as_deref(), Some("SN-777"));
}

// ---------------------------------------------------------------------------
// Test: identity mismatch aborts early
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_mismatch_aborts_before_any_collection_fetch() {
    let pool = pool().await;
    CompanyRepo::add(&pool, "Acme Ltd", "1001", "").await.unwrap();

    let driver = Arc::new(FakeDriver::for_company("Other Co"));
    let engine = SyncEngine::new(pool.clone(), Arc::clone(&driver) as Arc<dyn TallyDriver>);
    let messages = drain(engine.start("1001", "Acme Ltd").unwrap()).await;

    // Only the profile query ran; no collection was touched.
    assert_eq!(driver.queries().len(), 1);
    for spec in MASTER_COLLECTIONS {
        assert_eq!(table_count(&pool, spec.table).await, 0, "table {}", spec.table);
    }

    assert_eq!(status_of(&pool, "1001").await, SyncStatus::SyncFailed);

    // The error names the company actually found.
    let error = messages
        .iter()
        .find_map(|m| match m {
            SyncMessage::Error(text) => Some(text.clone()),
            _ => None,
        })
        .expect("an error message");
    assert!(error.contains("Other Co"), "error should name the loaded company: {error}");
    assert_matches!(
        messages.last(),
        Some(SyncMessage::Finished { status: SyncStatus::SyncFailed, .. })
    );
}

#[tokio::test]
async fn test_name_comparison_ignores_case() {
    let pool = pool().await;
    CompanyRepo::add(&pool, "Acme Ltd", "1001", "").await.unwrap();

    let engine = SyncEngine::new(pool.clone(), Arc::new(FakeDriver::for_company("ACME LTD")));
    drain(engine.start("1001", "Acme Ltd").unwrap()).await;

    assert_eq!(status_of(&pool, "1001").await, SyncStatus::Synced);
}

#[tokio::test]
async fn test_mismatch_leaves_stored_name_untouched() {
    let pool = pool().await;
    CompanyRepo::add(&pool, "Acme Ltd", "1001", "").await.unwrap();

    // First, a successful sync.
    let ok_engine = SyncEngine::new(pool.clone(), Arc::new(FakeDriver::for_company("Acme Ltd")));
    drain(ok_engine.start("1001", "Acme Ltd").unwrap()).await;
    assert_eq!(status_of(&pool, "1001").await, SyncStatus::Synced);

    // Then the wrong company is open in the ledger system.
    let bad_engine = SyncEngine::new(pool.clone(), Arc::new(FakeDriver::for_company("Other Co")));
    drain(bad_engine.start("1001", "Acme Ltd").unwrap()).await;

    let company = CompanyRepo::find_by_number(&pool, "1001").await.unwrap().unwrap();
    assert_eq!(company.tally_company_name, "Acme Ltd", "name must not be overwritten");
    assert_eq!(company.sync_status, SyncStatus::SyncFailed);
}

// ---------------------------------------------------------------------------
// Test: partial collection failure is isolated
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_one_failing_collection_does_not_abort_the_run() {
    let pool = pool().await;
    CompanyRepo::add(&pool, "Acme Ltd", "1001", "").await.unwrap();

    // Fail collection 7 of 19.
    let failing = &MASTER_COLLECTIONS[6];
    let mut driver = FakeDriver::for_company("Acme Ltd");
    driver.fail_sources.insert(failing.source);

    let engine = SyncEngine::new(pool.clone(), Arc::new(driver));
    let messages = drain(engine.start("1001", "Acme Ltd").unwrap()).await;

    // Every other collection still attempted and persisted.
    for spec in MASTER_COLLECTIONS {
        let expected = if spec.source == failing.source { 0 } else { 1 };
        assert_eq!(table_count(&pool, spec.table).await, expected, "table {}", spec.table);
    }

    // Profile succeeded, so the run still counts as synced.
    assert_eq!(status_of(&pool, "1001").await, SyncStatus::Synced);
    assert_matches!(
        messages.last(),
        Some(SyncMessage::Finished { status: SyncStatus::Synced, collections_synced }) if *collections_synced == MASTER_COLLECTIONS.len() - 1
    );

    // Collection failures are log-only; no user-facing error message.
    assert!(!messages.iter().any(|m| matches!(m, SyncMessage::Error(_))));
}

// ---------------------------------------------------------------------------
// Test: busy guard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_second_concurrent_run_is_rejected_with_busy() {
    let pool = pool().await;
    CompanyRepo::add(&pool, "Acme Ltd", "1001", "").await.unwrap();

    let gate = Arc::new(Semaphore::new(0));
    let mut driver = FakeDriver::for_company("Acme Ltd");
    driver.gate = Some(Arc::clone(&gate));

    let engine = SyncEngine::new(pool.clone(), Arc::new(driver));
    let rx = engine.start("1001", "Acme Ltd").unwrap();
    assert!(engine.is_syncing("1001"));

    // The first run is parked on its profile fetch; a second request for
    // the same company must be rejected, not queued.
    let err = engine.start("1001", "Acme Ltd").unwrap_err();
    assert_matches!(err, EngineError::Busy(number) if number == "1001");

    // Release the gate generously and let the first run finish.
    gate.add_permits(1000);
    drain(rx).await;
    assert!(!engine.is_syncing("1001"));

    // The guard is released; a new run may start.
    let rx = engine.start("1001", "Acme Ltd").unwrap();
    drain(rx).await;
}
