//! Repository for the append-only `company_log` table.

use sqlx::SqlitePool;

use crate::models::log_entry::CompanyLogEntry;

/// Longest detail string stored verbatim; anything longer is clipped.
const MAX_DETAIL_CHARS: usize = 1000;

pub struct CompanyLogRepo;

impl CompanyLogRepo {
    /// Append one audit entry. The action tag is stored upper-cased.
    ///
    /// Callers treat logging as best-effort: a failed append is reported
    /// but must not fail the operation being logged.
    pub async fn append(
        pool: &SqlitePool,
        company_number: &str,
        action: &str,
        details: &str,
    ) -> Result<(), sqlx::Error> {
        let clipped = clip_details(details);
        sqlx::query(
            "INSERT INTO company_log (tally_company_number, action, details) VALUES (?, ?, ?)",
        )
        .bind(company_number)
        .bind(action.to_uppercase())
        .bind(clipped)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// All entries for a company, oldest first.
    pub async fn for_company(
        pool: &SqlitePool,
        company_number: &str,
    ) -> Result<Vec<CompanyLogEntry>, sqlx::Error> {
        sqlx::query_as::<_, CompanyLogEntry>(
            "SELECT log_id, tally_company_number, action, details, timestamp
             FROM company_log WHERE tally_company_number = ? ORDER BY log_id",
        )
        .bind(company_number)
        .fetch_all(pool)
        .await
    }
}

/// Append an entry, logging (but swallowing) any failure.
pub(crate) async fn append_best_effort(
    pool: &SqlitePool,
    company_number: &str,
    action: &str,
    details: &str,
) {
    if let Err(e) = CompanyLogRepo::append(pool, company_number, action, details).await {
        tracing::error!(
            company = company_number,
            action,
            error = %e,
            "Failed to append change-log entry"
        );
    }
}

fn clip_details(details: &str) -> String {
    if details.chars().count() > MAX_DETAIL_CHARS + 3 {
        let clipped: String = details.chars().take(MAX_DETAIL_CHARS).collect();
        format!("{clipped}...")
    } else {
        details.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_details_are_kept_verbatim() {
        assert_eq!(clip_details("small"), "small");
    }

    #[test]
    fn long_details_are_clipped_with_ellipsis() {
        let long = "x".repeat(2000);
        let clipped = clip_details(&long);
        assert_eq!(clipped.chars().count(), MAX_DETAIL_CHARS + 3);
        assert!(clipped.ends_with("..."));
    }

    #[tokio::test]
    async fn entries_come_back_in_insertion_order() {
        let pool = crate::connect_memory().await.unwrap();
        crate::schema::ensure_schema(&pool).await.unwrap();

        CompanyLogRepo::append(&pool, "1001", "add", "first").await.unwrap();
        CompanyLogRepo::append(&pool, "1001", "edit", "second").await.unwrap();
        CompanyLogRepo::append(&pool, "2002", "add", "other company").await.unwrap();

        let entries = CompanyLogRepo::for_company(&pool, "1001").await.unwrap();
        assert_eq!(entries.len(), 2);
        // Stored upper-cased regardless of caller casing.
        assert_eq!(entries[0].action, "ADD");
        assert_eq!(entries[1].action, "EDIT");
        assert_eq!(entries[1].details.as_deref(), Some("second"));
    }
}
