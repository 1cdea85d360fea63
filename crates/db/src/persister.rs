//! Generic bulk upsert for master-data records.
//!
//! One `INSERT OR REPLACE` multi-row statement per chunk, with every row
//! stamped with the synchronization timestamp. The write is idempotent:
//! re-persisting the same records replaces the existing rows instead of
//! accumulating duplicates, because every master table carries a UNIQUE
//! constraint on its declared key.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tallysync_core::registry::CollectionSpec;
use tallysync_core::value::{Record, Value};

/// SQLite's default bind-parameter ceiling; batches are chunked so a single
/// statement never exceeds it.
const BIND_LIMIT: usize = 32766;

/// Upsert `records` into the collection's table.
///
/// Records lacking a non-null value for the collection's unique key are
/// skipped individually (logged) rather than failing the batch. Returns the
/// number of rows written; database errors, integrity violations included,
/// are logged and reported as zero progress for the affected chunk, never
/// propagated.
pub async fn persist_masters(pool: &SqlitePool, spec: &CollectionSpec, records: &[Record]) -> u64 {
    if records.is_empty() {
        tracing::info!(table = spec.table, "No records to persist");
        return 0;
    }

    let mut usable: Vec<&Record> = Vec::with_capacity(records.len());
    let mut skipped = 0usize;
    for record in records {
        match record.get(spec.unique_key) {
            Some(value) if !value.is_null() => usable.push(record),
            _ => {
                skipped += 1;
                tracing::warn!(
                    table = spec.table,
                    key = spec.unique_key,
                    "Skipping record with missing unique key"
                );
            }
        }
    }
    if skipped > 0 {
        tracing::warn!(table = spec.table, skipped, "Records skipped for missing keys");
    }
    if usable.is_empty() {
        tracing::warn!(table = spec.table, "No valid records to persist");
        return 0;
    }

    let now = Utc::now();
    let columns = spec
        .column_names()
        .chain(std::iter::once("last_synced_timestamp"))
        .collect::<Vec<_>>()
        .join(", ");
    let binds_per_row = spec.fields.len() + 1;
    let rows_per_chunk = (BIND_LIMIT / binds_per_row).max(1);

    let mut written = 0u64;
    for chunk in usable.chunks(rows_per_chunk) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "INSERT OR REPLACE INTO {} ({columns}) ",
            spec.table
        ));
        builder.push_values(chunk, |mut row, record| {
            for field in spec.fields {
                match record.get(field.key).unwrap_or(&Value::Null) {
                    Value::Null => row.push_bind(None::<String>),
                    Value::Bool(b) => row.push_bind(*b),
                    Value::Int(i) => row.push_bind(*i),
                    Value::Real(r) => row.push_bind(*r),
                    Value::Text(s) => row.push_bind(s.clone()),
                };
            }
            row.push_bind(now);
        });

        match builder.build().execute(pool).await {
            Ok(result) => written += result.rows_affected(),
            Err(e) => {
                tracing::error!(table = spec.table, error = %e, "Bulk persist chunk failed");
            }
        }
    }

    tracing::info!(
        table = spec.table,
        written,
        total = records.len(),
        "Bulk persist complete"
    );
    written
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
