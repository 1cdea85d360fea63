//! Per-company sync runs.
//!
//! A run executes on its own worker task and walks a fixed pipeline:
//! fetch the company profile, verify the identity of the company actually
//! loaded in the ledger system, persist the profile, then fetch and
//! persist every master-data collection in sequence. Collection-level
//! failures are isolated (a stale stock list must not prevent ledgers
//! from syncing), while an identity mismatch or profile-persist failure
//! aborts the run, because continuing would attribute another company's
//! data to the wrong target.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use tallysync_core::registry::MASTER_COLLECTIONS;
use tallysync_core::types::actions;
use tallysync_db::models::status::SyncStatus;
use tallysync_db::persister::persist_masters;
use tallysync_db::repositories::{CompanyLogRepo, CompanyRepo};
use tallysync_db::DbPool;
use tallysync_tally::driver::TallyDriver;
use tallysync_tally::fetcher::{fetch_company_profile, fetch_license_info, fetch_rows};

use crate::messages::SyncMessage;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A run is already in flight for this company; the request is
    /// rejected, not queued.
    #[error("a sync is already running for company {0}")]
    Busy(String),
}

/// Coordinates sync runs. Cheap to share; one instance serves all
/// companies and enforces at most one active run per company.
pub struct SyncEngine {
    pool: DbPool,
    driver: Arc<dyn TallyDriver>,
    active: Arc<Mutex<HashSet<String>>>,
}

impl SyncEngine {
    pub fn new(pool: DbPool, driver: Arc<dyn TallyDriver>) -> Self {
        Self {
            pool,
            driver,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Whether a run is currently in flight for `company_number`.
    pub fn is_syncing(&self, company_number: &str) -> bool {
        self.active.lock().unwrap().contains(company_number)
    }

    /// Start a sync run for one company.
    ///
    /// The caller has already confirmed that `expected_name` is the
    /// company meant to be open in the ledger system; the run re-verifies
    /// this against the fetched profile. Returns the progress channel, or
    /// [`EngineError::Busy`] if a run for this company is in flight.
    /// Cancellation mid-run is not supported: a started run proceeds to
    /// completion or to a fatal abort.
    pub fn start(
        &self,
        company_number: &str,
        expected_name: &str,
    ) -> Result<UnboundedReceiver<SyncMessage>, EngineError> {
        // Check-and-set under one lock so two concurrent requests cannot
        // both pass the guard.
        {
            let mut active = self.active.lock().unwrap();
            if !active.insert(company_number.to_string()) {
                tracing::warn!(company = company_number, "Sync already running; rejecting");
                return Err(EngineError::Busy(company_number.to_string()));
            }
        }
        let guard = ActiveGuard {
            active: Arc::clone(&self.active),
            company_number: company_number.to_string(),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let pool = self.pool.clone();
        let driver = Arc::clone(&self.driver);
        let number = company_number.to_string();
        let expected = expected_name.to_string();

        tokio::spawn(async move {
            let _guard = guard;
            run_sync(&pool, driver.as_ref(), &number, &expected, &tx).await;
        });

        Ok(rx)
    }
}

/// Clears the busy flag when the worker exits, on every path.
struct ActiveGuard {
    active: Arc<Mutex<HashSet<String>>>,
    company_number: String,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.lock().unwrap().remove(&self.company_number);
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Total pipeline steps: the profile plus every master collection.
fn total_steps() -> usize {
    MASTER_COLLECTIONS.len() + 1
}

async fn run_sync(
    pool: &DbPool,
    driver: &dyn TallyDriver,
    number: &str,
    expected_name: &str,
    tx: &UnboundedSender<SyncMessage>,
) {
    tracing::info!(company = number, "Sync run starting");
    emit(
        tx,
        SyncMessage::Progress {
            step: 1,
            total: total_steps(),
            label: "Company profile".to_string(),
        },
    );

    // Step 1: profile fetch + identity check.
    let mut profile = match fetch_company_profile(driver).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            fail_run(pool, number, tx, "Profile query returned no data; is the ledger system running with a company open?".to_string()).await;
            return;
        }
        Err(e) => {
            fail_run(pool, number, tx, format!("Profile fetch failed: {e}")).await;
            return;
        }
    };

    let fetched_name = profile
        .get("tally_company_name")
        .and_then(|v| v.as_text())
        .unwrap_or_default()
        .to_string();

    if !fetched_name.trim().eq_ignore_ascii_case(expected_name.trim()) {
        // Hard stop: the driver reflects whichever company is open in the
        // ledger system, and it is not the one this run targets.
        fail_run(
            pool,
            number,
            tx,
            format!(
                "Wrong company loaded in the ledger system: expected '{expected_name}', found '{fetched_name}'"
            ),
        )
        .await;
        return;
    }

    // License details live on the company row too; best-effort.
    match fetch_license_info(driver).await {
        Ok(Some(license)) => profile.extend(license),
        Ok(None) => tracing::warn!(company = number, "License query returned no data"),
        Err(e) => tracing::warn!(company = number, error = %e, "License fetch failed; continuing"),
    }

    // Step 1 continued: persist the profile. Failure here aborts; the
    // collections would be attributed to a company row we could not write.
    if let Err(e) = CompanyRepo::apply_profile_sync(pool, number, &profile).await {
        fail_run(pool, number, tx, format!("Profile persist failed: {e}")).await;
        return;
    }

    // Steps 2..: the master-data collections, failures isolated per
    // collection.
    let mut collections_synced = 0usize;
    for (index, spec) in MASTER_COLLECTIONS.iter().enumerate() {
        emit(
            tx,
            SyncMessage::Progress {
                step: index + 2,
                total: total_steps(),
                label: spec.label.to_string(),
            },
        );

        let records = match fetch_rows(driver, spec).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(
                    company = number,
                    collection = spec.label,
                    error = %e,
                    "Collection fetch failed; continuing with the next collection"
                );
                continue;
            }
        };
        if records.is_empty() {
            tracing::info!(company = number, collection = spec.label, "Collection empty; nothing to persist");
            continue;
        }

        let written = persist_masters(pool, spec, &records).await;
        if written > 0 {
            collections_synced += 1;
        } else {
            // Zero progress with records in hand is a soft failure.
            tracing::error!(
                company = number,
                collection = spec.label,
                records = records.len(),
                "Collection persisted zero rows"
            );
        }
    }

    // The profile step succeeded, so the run counts as synced regardless
    // of individual collection outcomes (apply_profile_sync already set
    // the status and stamped the time).
    tracing::info!(company = number, collections_synced, "Sync run complete");
    emit(
        tx,
        SyncMessage::Finished {
            status: SyncStatus::Synced,
            collections_synced,
        },
    );
}

/// Mark the run failed, record why, and emit the terminal messages.
async fn fail_run(pool: &DbPool, number: &str, tx: &UnboundedSender<SyncMessage>, reason: String) {
    tracing::error!(company = number, reason, "Sync run failed");

    if let Err(e) = CompanyRepo::set_sync_status(pool, number, SyncStatus::SyncFailed).await {
        tracing::error!(company = number, error = %e, "Could not mark company as failed");
    }
    if let Err(e) = CompanyLogRepo::append(pool, number, actions::SYNC_FAIL, &reason).await {
        tracing::error!(company = number, error = %e, "Could not record sync failure");
    }

    emit(tx, SyncMessage::Error(reason));
    emit(
        tx,
        SyncMessage::Finished {
            status: SyncStatus::SyncFailed,
            collections_synced: 0,
        },
    );
}

/// Send without blocking; a consumer that went away only loses messages
/// for itself.
fn emit(tx: &UnboundedSender<SyncMessage>, message: SyncMessage) {
    let _ = tx.send(message);
}
