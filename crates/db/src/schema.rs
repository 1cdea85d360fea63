//! Declarative schema management.
//!
//! [`ensure_schema`] is idempotent and runs at every startup: it creates
//! all tables `IF NOT EXISTS`, evolves the `companies` table by adding any
//! column present in the registry but missing from the live table, and
//! finishes with an orphan-cleanup pass over the dependent master tables.
//!
//! Failure semantics: the base `companies` table is load-bearing and its
//! creation failure aborts startup; every other table or column failure is
//! logged and skipped so one broken secondary table cannot keep the whole
//! application down.

use sqlx::{Row, SqlitePool};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The base `companies` table could not be created.
    #[error("failed to create the companies table: {0}")]
    Companies(#[source] sqlx::Error),
}

// ---------------------------------------------------------------------------
// companies column registry
// ---------------------------------------------------------------------------

/// Columns of the `companies` table beyond the base definition, with their
/// SQLite types. New profile or license attributes are added here and the
/// schema manager grows the live table on the next startup; the table is
/// never rebuilt destructively.
pub static COMPANY_COLUMNS: &[(&str, &str)] = &[
    ("tally_company_name", "TEXT NOT NULL"),
    ("formal_name", "TEXT"),
    ("address", "TEXT"),
    ("state_name", "TEXT"),
    ("country_name", "TEXT"),
    ("pincode", "TEXT"),
    ("phone_number", "TEXT"),
    ("mobile_no", "TEXT"),
    ("fax_number", "TEXT"),
    ("email", "TEXT"),
    ("website", "TEXT"),
    ("start_date", "TEXT"),
    ("books_date", "TEXT"),
    ("is_security_on", "BOOLEAN"),
    ("owner_name", "TEXT"),
    ("is_tally_audit_on", "BOOLEAN"),
    ("is_disallow_edu", "BOOLEAN"),
    ("currency_name", "TEXT"),
    ("currency_formal_name", "TEXT"),
    ("is_currency_suffix", "BOOLEAN"),
    ("in_millions", "BOOLEAN"),
    ("decimal_places", "INTEGER"),
    ("decimal_symbol", "TEXT"),
    ("decimal_places_printing", "INTEGER"),
    ("guid", "TEXT"),
    ("master_id", "INTEGER"),
    ("alter_id", "INTEGER"),
    ("serial_number", "TEXT"),
    ("account_id", "TEXT"),
    ("site_id", "TEXT"),
    ("admin_email", "TEXT"),
    ("is_indian", "BOOLEAN"),
    ("is_silver", "BOOLEAN"),
    ("is_gold", "BOOLEAN"),
    ("is_licensed", "BOOLEAN"),
    ("version", "TEXT"),
    ("gateway_server", "TEXT"),
    ("acting_as", "TEXT"),
    ("odbc_enabled", "BOOLEAN"),
    ("odbc_port", "INTEGER"),
    ("sync_status", "TEXT DEFAULT 'Not Synced'"),
    ("last_sync_timestamp", "DATETIME"),
    ("updated_timestamp", "DATETIME"),
];

/// Columns declared in the base `CREATE TABLE` and therefore never ALTERed.
const BASE_COLUMNS: &[&str] = &[
    "id",
    "tally_company_number",
    "tally_company_name",
    "description",
    "is_active",
    "added_timestamp",
];

/// Columns the sync engine manages itself and a profile record may not set.
const MANAGED_COLUMNS: &[&str] = &["sync_status", "last_sync_timestamp", "updated_timestamp"];

/// Whether `name` is a `companies` column a profile sync may overwrite.
pub fn is_profile_column(name: &str) -> bool {
    !MANAGED_COLUMNS.contains(&name) && COMPANY_COLUMNS.iter().any(|(col, _)| *col == name)
}

// ---------------------------------------------------------------------------
// Master-data tables
// ---------------------------------------------------------------------------

struct MasterTable {
    table: &'static str,
    ddl: &'static str,
    indexes: &'static [&'static str],
}

/// Foreign-key clauses below document the advisory parent references; they
/// are not enforced at write time (the pool opens with foreign_keys off)
/// and are reconciled by [`clean_orphaned_rows`] instead.
static MASTER_TABLES: &[MasterTable] = &[
    MasterTable {
        table: "tally_accounting_groups",
        ddl: "CREATE TABLE IF NOT EXISTS tally_accounting_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            parent TEXT,
            is_subledger BOOLEAN,
            is_addable BOOLEAN,
            basic_group_is_calculable BOOLEAN,
            addl_alloctype TEXT,
            master_id INTEGER,
            alter_id INTEGER,
            last_synced_timestamp DATETIME NOT NULL
        )",
        indexes: &["CREATE INDEX IF NOT EXISTS idx_accgroup_name ON tally_accounting_groups (name)"],
    },
    MasterTable {
        table: "tally_ledgers",
        ddl: "CREATE TABLE IF NOT EXISTS tally_ledgers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tally_guid TEXT UNIQUE NOT NULL,
            tally_name TEXT NOT NULL,
            parent_name TEXT,
            currency_name TEXT,
            opening_balance REAL,
            closing_balance REAL,
            is_billwise_on BOOLEAN,
            affects_stock BOOLEAN,
            is_cost_centres_on BOOLEAN,
            gst_registration_type TEXT,
            party_gstin TEXT,
            last_synced_timestamp DATETIME NOT NULL
        )",
        indexes: &[
            "CREATE INDEX IF NOT EXISTS idx_ledger_guid ON tally_ledgers (tally_guid)",
            "CREATE INDEX IF NOT EXISTS idx_ledger_name ON tally_ledgers (tally_name)",
        ],
    },
    MasterTable {
        table: "tally_ledgerbillwise",
        ddl: "CREATE TABLE IF NOT EXISTS tally_ledgerbillwise (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ledger_guid TEXT,
            name TEXT,
            billdate TEXT,
            billcreditperiod TEXT,
            isadvance BOOLEAN,
            openingbalance REAL,
            last_synced_timestamp DATETIME NOT NULL,
            FOREIGN KEY (ledger_guid) REFERENCES tally_ledgers(tally_guid)
        )",
        indexes: &["CREATE INDEX IF NOT EXISTS idx_ledgerbillwise_name ON tally_ledgerbillwise (name)"],
    },
    MasterTable {
        table: "tally_costcategory",
        ddl: "CREATE TABLE IF NOT EXISTS tally_costcategory (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            allocate_revenue BOOLEAN,
            allocate_nonrevenue BOOLEAN,
            master_id INTEGER,
            alter_id INTEGER,
            last_synced_timestamp DATETIME NOT NULL
        )",
        indexes: &["CREATE INDEX IF NOT EXISTS idx_costcategory_name ON tally_costcategory (name)"],
    },
    MasterTable {
        table: "tally_costcenter",
        ddl: "CREATE TABLE IF NOT EXISTS tally_costcenter (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            category TEXT,
            parent TEXT,
            revenue_ledger_for_opbal TEXT,
            email_id TEXT,
            master_id INTEGER,
            alter_id INTEGER,
            last_synced_timestamp DATETIME NOT NULL
        )",
        indexes: &["CREATE INDEX IF NOT EXISTS idx_costcenter_name ON tally_costcenter (name)"],
    },
    MasterTable {
        table: "tally_currency",
        ddl: "CREATE TABLE IF NOT EXISTS tally_currency (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            mailing_name TEXT,
            iso_currency_code TEXT,
            decimal_places INTEGER,
            in_millions BOOLEAN,
            is_suffix BOOLEAN,
            has_space BOOLEAN,
            decimal_symbol TEXT,
            decimal_places_printing INTEGER,
            sort_position INTEGER,
            master_id INTEGER,
            alter_id INTEGER,
            last_synced_timestamp DATETIME NOT NULL
        )",
        indexes: &["CREATE INDEX IF NOT EXISTS idx_currency_name ON tally_currency (name)"],
    },
    MasterTable {
        table: "tally_vouchertype",
        ddl: "CREATE TABLE IF NOT EXISTS tally_vouchertype (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            parent TEXT,
            additional_name TEXT,
            is_active BOOLEAN,
            numbering_method TEXT,
            prevent_duplicates BOOLEAN,
            effective_date TEXT,
            use_zero_entries BOOLEAN,
            print_after_save BOOLEAN,
            formal_receipt BOOLEAN,
            is_optional BOOLEAN,
            as_mfg_jrnl BOOLEAN,
            common_narration BOOLEAN,
            multi_narration BOOLEAN,
            use_for_pos_invoice BOOLEAN,
            use_for_jobwork BOOLEAN,
            is_for_jobwork_in BOOLEAN,
            allow_consumption BOOLEAN,
            is_default_alloc_enabled BOOLEAN,
            master_id INTEGER,
            alter_id INTEGER,
            last_synced_timestamp DATETIME NOT NULL
        )",
        indexes: &["CREATE INDEX IF NOT EXISTS idx_vouchertype_name ON tally_vouchertype (name)"],
    },
    MasterTable {
        table: "tally_stock_groups",
        ddl: "CREATE TABLE IF NOT EXISTS tally_stock_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tally_guid TEXT UNIQUE NOT NULL,
            tally_name TEXT NOT NULL,
            parent_name TEXT,
            is_addable BOOLEAN,
            master_id INTEGER,
            alter_id INTEGER,
            last_synced_timestamp DATETIME NOT NULL
        )",
        indexes: &[
            "CREATE INDEX IF NOT EXISTS idx_stockgroup_guid ON tally_stock_groups (tally_guid)",
            "CREATE INDEX IF NOT EXISTS idx_stockgroup_name ON tally_stock_groups (tally_name)",
        ],
    },
    MasterTable {
        table: "tally_stock_items",
        ddl: "CREATE TABLE IF NOT EXISTS tally_stock_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tally_guid TEXT UNIQUE NOT NULL,
            tally_name TEXT NOT NULL,
            parent_name TEXT,
            category_name TEXT,
            base_units TEXT,
            gst_applicable TEXT,
            gst_type_of_supply TEXT,
            hsn_code TEXT,
            opening_balance REAL,
            opening_rate REAL,
            opening_value REAL,
            closing_balance REAL,
            closing_rate REAL,
            closing_value REAL,
            last_synced_timestamp DATETIME NOT NULL
        )",
        indexes: &[
            "CREATE INDEX IF NOT EXISTS idx_stockitem_guid ON tally_stock_items (tally_guid)",
            "CREATE INDEX IF NOT EXISTS idx_stockitem_name ON tally_stock_items (tally_name)",
        ],
    },
    MasterTable {
        table: "tally_units",
        ddl: "CREATE TABLE IF NOT EXISTS tally_units (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tally_guid TEXT UNIQUE NOT NULL,
            tally_name TEXT NOT NULL,
            original_name TEXT,
            base_units TEXT,
            additional_units TEXT,
            conversion REAL,
            decimal_places INTEGER,
            is_simple_unit BOOLEAN,
            master_id INTEGER,
            alter_id INTEGER,
            last_synced_timestamp DATETIME NOT NULL
        )",
        indexes: &["CREATE INDEX IF NOT EXISTS idx_unit_guid ON tally_units (tally_guid)"],
    },
    MasterTable {
        table: "tally_stockgroupwithgst",
        ddl: "CREATE TABLE IF NOT EXISTS tally_stockgroupwithgst (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            parent TEXT,
            is_addable BOOLEAN,
            master_id INTEGER,
            alter_id INTEGER,
            gst_rate_duty_head TEXT,
            gst_rate_valuation_type TEXT,
            gst_rate REAL,
            applicable_from TEXT,
            hsn_code TEXT,
            hsn TEXT,
            taxability TEXT,
            is_reverse_charge_applicable BOOLEAN,
            is_non_gst_goods BOOLEAN,
            gst_ineligible_itc BOOLEAN,
            last_synced_timestamp DATETIME NOT NULL,
            FOREIGN KEY (name) REFERENCES tally_stock_groups(tally_guid)
        )",
        indexes: &["CREATE INDEX IF NOT EXISTS idx_stockgroupwithgst_name ON tally_stockgroupwithgst (name)"],
    },
    MasterTable {
        table: "tally_stockcategory",
        ddl: "CREATE TABLE IF NOT EXISTS tally_stockcategory (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            parent TEXT,
            master_id INTEGER,
            alter_id INTEGER,
            last_synced_timestamp DATETIME NOT NULL
        )",
        indexes: &["CREATE INDEX IF NOT EXISTS idx_stockcategory_name ON tally_stockcategory (name)"],
    },
    MasterTable {
        table: "tally_godown",
        ddl: "CREATE TABLE IF NOT EXISTS tally_godown (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            parent TEXT,
            has_no_space BOOLEAN,
            is_internal BOOLEAN,
            is_external BOOLEAN,
            address TEXT,
            master_id INTEGER,
            alter_id INTEGER,
            last_synced_timestamp DATETIME NOT NULL
        )",
        indexes: &["CREATE INDEX IF NOT EXISTS idx_godown_name ON tally_godown (name)"],
    },
    MasterTable {
        table: "tally_stockitem_gst",
        ddl: "CREATE TABLE IF NOT EXISTS tally_stockitem_gst (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            master_id INTEGER,
            alter_id INTEGER,
            gst_rate_duty_head TEXT,
            gst_rate_valuation_type TEXT,
            gst_rate REAL,
            applicable_from TEXT,
            hsn_code TEXT,
            hsn TEXT,
            taxability TEXT,
            is_reverse_charge_applicable BOOLEAN,
            is_non_gst_goods BOOLEAN,
            gst_ineligible_itc BOOLEAN,
            last_synced_timestamp DATETIME NOT NULL,
            FOREIGN KEY (name) REFERENCES tally_stock_items(tally_guid)
        )",
        indexes: &["CREATE INDEX IF NOT EXISTS idx_stockitem_gst_name ON tally_stockitem_gst (name)"],
    },
    MasterTable {
        table: "tally_stockitem_mrp",
        ddl: "CREATE TABLE IF NOT EXISTS tally_stockitem_mrp (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            master_id INTEGER,
            alter_id INTEGER,
            from_date TEXT,
            state_name TEXT,
            mrp_rate REAL,
            last_synced_timestamp DATETIME NOT NULL,
            FOREIGN KEY (name) REFERENCES tally_stock_items(tally_guid)
        )",
        indexes: &["CREATE INDEX IF NOT EXISTS idx_stockitem_mrp_name ON tally_stockitem_mrp (name)"],
    },
    MasterTable {
        table: "tally_stockitem_bom",
        ddl: "CREATE TABLE IF NOT EXISTS tally_stockitem_bom (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            master_id INTEGER,
            alter_id INTEGER,
            nature_of_item TEXT,
            stockitem_name TEXT,
            godown_name TEXT,
            actual_qty REAL,
            component_list_name TEXT,
            component_basic_qty REAL,
            last_synced_timestamp DATETIME NOT NULL,
            FOREIGN KEY (name) REFERENCES tally_stock_items(tally_guid),
            FOREIGN KEY (godown_name) REFERENCES tally_godown(name)
        )",
        indexes: &["CREATE INDEX IF NOT EXISTS idx_stockitem_bom_name ON tally_stockitem_bom (name)"],
    },
    MasterTable {
        table: "tally_stockitem_standardcost",
        ddl: "CREATE TABLE IF NOT EXISTS tally_stockitem_standardcost (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            master_id INTEGER,
            alter_id INTEGER,
            date TEXT,
            rate REAL,
            last_synced_timestamp DATETIME NOT NULL,
            FOREIGN KEY (name) REFERENCES tally_stock_items(tally_guid)
        )",
        indexes: &[
            "CREATE INDEX IF NOT EXISTS idx_stockitem_standardcost_name ON tally_stockitem_standardcost (name)",
        ],
    },
    MasterTable {
        table: "tally_stockitem_standardprice",
        ddl: "CREATE TABLE IF NOT EXISTS tally_stockitem_standardprice (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            master_id INTEGER,
            alter_id INTEGER,
            date TEXT,
            rate REAL,
            last_synced_timestamp DATETIME NOT NULL,
            FOREIGN KEY (name) REFERENCES tally_stock_items(tally_guid)
        )",
        indexes: &[
            "CREATE INDEX IF NOT EXISTS idx_stockitem_standardprice_name ON tally_stockitem_standardprice (name)",
        ],
    },
    MasterTable {
        table: "tally_stockitem_batchdetails",
        ddl: "CREATE TABLE IF NOT EXISTS tally_stockitem_batchdetails (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            master_id INTEGER,
            alter_id INTEGER,
            mfg_date TEXT,
            godown_name TEXT,
            batch_name TEXT,
            opening_balance REAL,
            opening_value REAL,
            opening_rate REAL,
            expiry_period TEXT,
            last_synced_timestamp DATETIME NOT NULL,
            FOREIGN KEY (name) REFERENCES tally_stock_items(tally_guid),
            FOREIGN KEY (godown_name) REFERENCES tally_godown(name)
        )",
        indexes: &[
            "CREATE INDEX IF NOT EXISTS idx_stockitem_batchdetails_name ON tally_stockitem_batchdetails (name)",
        ],
    },
];

// ---------------------------------------------------------------------------
// Schema initialization
// ---------------------------------------------------------------------------

/// Create and evolve the full schema. Safe to call on every startup.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), SchemaError> {
    create_companies_table(pool).await?;
    create_company_log_table(pool).await;
    create_master_tables(pool).await;
    clean_orphaned_rows(pool).await;
    Ok(())
}

/// Create the base `companies` table and add any registry column missing
/// from the live table.
async fn create_companies_table(pool: &SqlitePool) -> Result<(), SchemaError> {
    let ddl = "CREATE TABLE IF NOT EXISTS companies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tally_company_number TEXT UNIQUE NOT NULL,
        tally_company_name TEXT NOT NULL,
        description TEXT,
        is_active BOOLEAN DEFAULT 1 NOT NULL,
        added_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
    )";
    sqlx::query(ddl)
        .execute(pool)
        .await
        .map_err(SchemaError::Companies)?;

    let existing = match existing_columns(pool, "companies").await {
        Ok(cols) => cols,
        Err(e) => {
            tracing::error!(error = %e, "Could not introspect companies columns; skipping evolution");
            return Ok(());
        }
    };

    for (name, col_type) in COMPANY_COLUMNS {
        if BASE_COLUMNS.contains(name) || existing.iter().any(|c| c.eq_ignore_ascii_case(name)) {
            continue;
        }
        let alter = format!("ALTER TABLE companies ADD COLUMN {name} {col_type}");
        match sqlx::query(&alter).execute(pool).await {
            Ok(_) => tracing::info!(column = name, "Added companies column"),
            Err(e) => tracing::error!(column = name, error = %e, "Failed to add companies column"),
        }
    }

    Ok(())
}

/// Lower-cased column names of a live table, via `PRAGMA table_info`.
async fn existing_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .map(|row| row.get::<String, _>("name").to_lowercase())
        .collect())
}

async fn create_company_log_table(pool: &SqlitePool) {
    let ddl = "CREATE TABLE IF NOT EXISTS company_log (
        log_id INTEGER PRIMARY KEY AUTOINCREMENT,
        tally_company_number TEXT NOT NULL,
        action TEXT NOT NULL,
        details TEXT,
        timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
    )";
    if let Err(e) = sqlx::query(ddl).execute(pool).await {
        tracing::error!(error = %e, "Failed to create company_log table");
    }
}

async fn create_master_tables(pool: &SqlitePool) {
    for def in MASTER_TABLES {
        if let Err(e) = sqlx::query(def.ddl).execute(pool).await {
            tracing::error!(table = def.table, error = %e, "Failed to create master table");
            continue;
        }
        for index in def.indexes {
            if let Err(e) = sqlx::query(index).execute(pool).await {
                tracing::error!(table = def.table, error = %e, "Failed to create index");
            }
        }
        tracing::debug!(table = def.table, "Verified master table");
    }
}

// ---------------------------------------------------------------------------
// Orphan cleanup
// ---------------------------------------------------------------------------

/// Delete rows in dependent tables whose parent key no longer exists.
///
/// The store does not enforce foreign keys at write time, so after partial
/// syncs a child table can reference parents that never arrived. Runs
/// unconditionally on every startup.
pub async fn clean_orphaned_rows(pool: &SqlitePool) {
    let cleanups: &[(&str, &str)] = &[
        (
            "tally_stockitem_batchdetails",
            "DELETE FROM tally_stockitem_batchdetails
             WHERE name NOT IN (SELECT tally_guid FROM tally_stock_items)",
        ),
        (
            "tally_stockgroupwithgst",
            "DELETE FROM tally_stockgroupwithgst
             WHERE name NOT IN (SELECT tally_guid FROM tally_stock_groups)",
        ),
    ];

    for (table, sql) in cleanups {
        match sqlx::query(sql).execute(pool).await {
            Ok(result) => {
                let removed = result.rows_affected();
                if removed > 0 {
                    tracing::info!(table, removed, "Removed orphaned rows");
                }
            }
            Err(e) => tracing::error!(table, error = %e, "Orphan cleanup failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    async fn pool() -> SqlitePool {
        crate::connect_memory().await.expect("in-memory pool")
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let pool = pool().await;
        ensure_schema(&pool).await.unwrap();
        ensure_schema(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn companies_table_grows_registry_columns() {
        let pool = pool().await;
        ensure_schema(&pool).await.unwrap();

        let cols = existing_columns(&pool, "companies").await.unwrap();
        for (name, _) in COMPANY_COLUMNS {
            assert!(cols.contains(&name.to_string()), "missing column {name}");
        }
    }

    #[tokio::test]
    async fn evolution_adds_columns_to_a_preexisting_base_table() {
        let pool = pool().await;
        // Simulate an old installation that only has the base table.
        sqlx::query(
            "CREATE TABLE companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tally_company_number TEXT UNIQUE NOT NULL,
                tally_company_name TEXT NOT NULL,
                description TEXT,
                is_active BOOLEAN DEFAULT 1 NOT NULL,
                added_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        ensure_schema(&pool).await.unwrap();

        let cols = existing_columns(&pool, "companies").await.unwrap();
        assert!(cols.contains(&"address".to_string()));
        assert!(cols.contains(&"sync_status".to_string()));
    }

    #[tokio::test]
    async fn all_master_tables_exist_after_init() {
        let pool = pool().await;
        ensure_schema(&pool).await.unwrap();

        for def in MASTER_TABLES {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(def.table)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert_eq!(count, 1, "table {} missing", def.table);
        }
    }

    #[tokio::test]
    async fn orphan_cleanup_removes_only_orphans() {
        let pool = pool().await;
        ensure_schema(&pool).await.unwrap();

        sqlx::query(
            "INSERT INTO tally_stock_items (tally_guid, tally_name, last_synced_timestamp)
             VALUES ('guid-1', 'Widget', CURRENT_TIMESTAMP)",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO tally_stockitem_batchdetails (name, batch_name, last_synced_timestamp)
             VALUES ('guid-1', 'B1', CURRENT_TIMESTAMP),
                    ('guid-gone', 'B2', CURRENT_TIMESTAMP)",
        )
        .execute(&pool)
        .await
        .unwrap();

        clean_orphaned_rows(&pool).await;

        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM tally_stockitem_batchdetails")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(names, vec!["guid-1".to_string()]);
    }

    #[test]
    fn profile_columns_exclude_managed_columns() {
        assert!(is_profile_column("address"));
        assert!(is_profile_column("serial_number"));
        assert!(is_profile_column("tally_company_name"));
        assert!(!is_profile_column("sync_status"));
        assert!(!is_profile_column("last_sync_timestamp"));
        assert!(!is_profile_column("no_such_column"));
    }
}
