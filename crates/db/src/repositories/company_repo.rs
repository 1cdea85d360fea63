//! Repository for the `companies` table.
//!
//! Lifecycle rules: the external company number is unique across all rows
//! ever created; re-adding a soft-deleted number reactivates the existing
//! row (resetting its sync status) instead of inserting a second one, and
//! adding an already-active number is a no-op. Every mutating operation
//! appends a change-log entry describing the transition.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tallysync_core::types::actions;
use tallysync_core::value::{Record, Value};

use crate::models::company::Company;
use crate::models::status::SyncStatus;
use crate::repositories::company_log_repo::append_best_effort;
use crate::schema::is_profile_column;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, tally_company_number, tally_company_name, description, \
                       is_active, sync_status, last_sync_timestamp";

/// Outcome of an [`CompanyRepo::add`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A brand-new row was inserted.
    Added,
    /// A soft-deleted row with this number was reactivated.
    Reactivated,
    /// An active row already exists; nothing changed.
    Unchanged,
}

/// Outcome of an [`CompanyRepo::edit`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Updated,
    /// Name and description already matched; nothing changed.
    Unchanged,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("company name '{0}' is already used by another active company")]
    NameTaken(String),

    #[error("company {0} not found or inactive")]
    NotFound(String),

    #[error("profile record carries no company name")]
    MissingProfileName,

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Provides lifecycle operations for companies.
pub struct CompanyRepo;

impl CompanyRepo {
    /// Add a company discovered in the ledger system, or reactivate a
    /// previously soft-deleted row with the same number.
    pub async fn add(
        pool: &SqlitePool,
        name: &str,
        number: &str,
        description: &str,
    ) -> Result<AddOutcome, StoreError> {
        match Self::find_by_number_any(pool, number).await? {
            Some(existing) if !existing.is_active => {
                sqlx::query(
                    "UPDATE companies
                     SET tally_company_name = ?, description = ?, is_active = 1,
                         sync_status = ?, updated_timestamp = CURRENT_TIMESTAMP
                     WHERE tally_company_number = ?",
                )
                .bind(name)
                .bind(description)
                .bind(SyncStatus::NotSynced)
                .bind(number)
                .execute(pool)
                .await?;

                append_best_effort(pool, number, actions::REACTIVATE, &format!("Name: '{name}'"))
                    .await;
                tracing::info!(company = number, name, "Reactivated company");
                Ok(AddOutcome::Reactivated)
            }
            Some(_) => {
                tracing::info!(company = number, "Company already active; nothing to add");
                Ok(AddOutcome::Unchanged)
            }
            None => {
                sqlx::query(
                    "INSERT INTO companies
                         (tally_company_number, tally_company_name, description,
                          is_active, sync_status)
                     VALUES (?, ?, ?, 1, ?)",
                )
                .bind(number)
                .bind(name)
                .bind(description)
                .bind(SyncStatus::NotSynced)
                .execute(pool)
                .await?;

                append_best_effort(pool, number, actions::ADD, &format!("Name: '{name}'")).await;
                tracing::info!(company = number, name, "Added company");
                Ok(AddOutcome::Added)
            }
        }
    }

    /// All active companies, ordered by name.
    pub async fn list_active(pool: &SqlitePool) -> Result<Vec<Company>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM companies WHERE is_active = 1 ORDER BY tally_company_name"
        );
        sqlx::query_as::<_, Company>(&query).fetch_all(pool).await
    }

    /// Find an active company by its external number.
    pub async fn find_by_number(
        pool: &SqlitePool,
        number: &str,
    ) -> Result<Option<Company>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM companies WHERE tally_company_number = ? AND is_active = 1");
        sqlx::query_as::<_, Company>(&query)
            .bind(number)
            .fetch_optional(pool)
            .await
    }

    /// Find a company by number, including soft-deleted rows. Used for the
    /// reactivation check on add.
    pub async fn find_by_number_any(
        pool: &SqlitePool,
        number: &str,
    ) -> Result<Option<Company>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM companies WHERE tally_company_number = ?");
        sqlx::query_as::<_, Company>(&query)
            .bind(number)
            .fetch_optional(pool)
            .await
    }

    /// Update name and description of an active company.
    ///
    /// Rejects a name already used by another active company; a call that
    /// changes nothing is reported as [`EditOutcome::Unchanged`].
    pub async fn edit(
        pool: &SqlitePool,
        number: &str,
        new_name: &str,
        new_description: Option<&str>,
    ) -> Result<EditOutcome, StoreError> {
        let taken: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM companies
             WHERE tally_company_name = ? AND tally_company_number != ? AND is_active = 1
             LIMIT 1",
        )
        .bind(new_name)
        .bind(number)
        .fetch_optional(pool)
        .await?;
        if taken.is_some() {
            return Err(StoreError::NameTaken(new_name.to_string()));
        }

        let current = Self::find_by_number(pool, number)
            .await?
            .ok_or_else(|| StoreError::NotFound(number.to_string()))?;

        let current_desc = current.description.as_deref().unwrap_or("");
        let desc = new_description.unwrap_or(current_desc);
        if current.tally_company_name == new_name && current_desc == desc {
            tracing::info!(company = number, "Edit requested but nothing changed");
            return Ok(EditOutcome::Unchanged);
        }

        sqlx::query(
            "UPDATE companies
             SET tally_company_name = ?, description = ?, updated_timestamp = CURRENT_TIMESTAMP
             WHERE tally_company_number = ? AND is_active = 1",
        )
        .bind(new_name)
        .bind(desc)
        .bind(number)
        .execute(pool)
        .await?;

        let mut changes = Vec::new();
        if current.tally_company_name != new_name {
            changes.push(format!("Name: '{}' -> '{new_name}'", current.tally_company_name));
        }
        if current_desc != desc {
            changes.push("Description updated".to_string());
        }
        append_best_effort(pool, number, actions::EDIT, &changes.join("; ")).await;
        tracing::info!(company = number, "Company updated");
        Ok(EditOutcome::Updated)
    }

    /// Mark an active company inactive. Returns `false` when the company
    /// is missing or already inactive (a no-op, not an error).
    pub async fn soft_delete(pool: &SqlitePool, number: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE companies
             SET is_active = 0, updated_timestamp = CURRENT_TIMESTAMP
             WHERE tally_company_number = ? AND is_active = 1",
        )
        .bind(number)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            append_best_effort(pool, number, actions::SOFT_DELETE, "Marked inactive").await;
            tracing::info!(company = number, "Company soft-deleted");
            Ok(true)
        } else {
            tracing::warn!(company = number, "Soft delete skipped: not found or inactive");
            Ok(false)
        }
    }

    /// Overwrite the profile columns from a fetched profile record, set
    /// the status to Synced and stamp the sync time.
    ///
    /// Self-healing: when no row exists for `number` yet, one is created
    /// first from the profile's own name field.
    pub async fn apply_profile_sync(
        pool: &SqlitePool,
        number: &str,
        profile: &Record,
    ) -> Result<(), StoreError> {
        let name = profile
            .get("tally_company_name")
            .and_then(|v| v.as_text())
            .ok_or(StoreError::MissingProfileName)?
            .to_string();

        if Self::find_by_number(pool, number).await?.is_none() {
            tracing::info!(company = number, "Company row missing; creating before profile sync");
            Self::add(pool, &name, number, "").await?;
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE companies SET ");
        let mut assignments = builder.separated(", ");
        let mut applied = 0usize;
        for (key, value) in profile {
            if !is_profile_column(key) {
                tracing::warn!(company = number, key, "Skipping unknown profile key");
                continue;
            }
            if value.is_null() {
                continue;
            }
            assignments.push(format!("{key} = "));
            match value {
                Value::Bool(b) => assignments.push_bind_unseparated(*b),
                Value::Int(i) => assignments.push_bind_unseparated(*i),
                Value::Real(r) => assignments.push_bind_unseparated(*r),
                Value::Text(s) => assignments.push_bind_unseparated(s.clone()),
                Value::Null => unreachable!(),
            };
            applied += 1;
        }

        assignments.push("sync_status = ");
        assignments.push_bind_unseparated(SyncStatus::Synced);
        assignments.push("last_sync_timestamp = ");
        assignments.push_bind_unseparated(chrono::Utc::now());
        assignments.push("updated_timestamp = CURRENT_TIMESTAMP");

        builder.push(" WHERE tally_company_number = ");
        builder.push_bind(number);
        builder.push(" AND is_active = 1");

        let result = builder.build().execute(pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(number.to_string()));
        }

        append_best_effort(
            pool,
            number,
            actions::SYNC_SUCCESS,
            &format!("Profile updated from sync ({applied} fields)"),
        )
        .await;
        tracing::info!(company = number, fields = applied, "Profile sync applied");
        Ok(())
    }

    /// Explicit status transition, independent of profile data. Used when a
    /// run must mark the company failed without touching profile fields.
    pub async fn set_sync_status(
        pool: &SqlitePool,
        number: &str,
        status: SyncStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE companies
             SET sync_status = ?, last_sync_timestamp = ?, updated_timestamp = CURRENT_TIMESTAMP
             WHERE tally_company_number = ?",
        )
        .bind(status)
        .bind(chrono::Utc::now())
        .bind(number)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            append_best_effort(
                pool,
                number,
                actions::STATUS_UPDATE,
                &format!("Sync status set to '{status}'"),
            )
            .await;
            tracing::debug!(company = number, %status, "Sync status updated");
            Ok(true)
        } else {
            tracing::warn!(company = number, %status, "Sync status update matched no row");
            Ok(false)
        }
    }
}
