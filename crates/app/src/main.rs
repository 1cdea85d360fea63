//! Command-line entry point: bootstraps logging, opens the local store,
//! ensures the schema, and dispatches one of the small operator commands.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tallysync_db::models::status::SyncStatus;
use tallysync_db::repositories::{AddOutcome, CompanyRepo};
use tallysync_engine::{SyncEngine, SyncMessage};
use tallysync_tally::driver::TallyDriver;
use tallysync_tally::gateway::GatewayClient;

mod settings;

use settings::Settings;

const USAGE: &str = "usage: tallysync <command>

commands:
  check                  probe the ledger-system gateway
  companies              list companies available in the ledger system
  list                   list companies added to the local store
  add <number> <name>    add (or reactivate) a company
  sync <number>          run a full master-data sync for a company
";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tallysync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_path =
        std::env::var("TALLYSYNC_DB").unwrap_or_else(|_| "config/tallysync.db".to_string());
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let pool = tallysync_db::connect(&db_path).await?;
    tallysync_db::schema::ensure_schema(&pool).await?;

    let settings = Settings::load(&settings::default_path());
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("check") => {
            let client = gateway_client(&settings)?;
            if client.check_connection().await {
                println!("Connected to ledger system at {}", client.base_url());
            } else {
                println!("Could not reach ledger system at {}", client.base_url());
                std::process::exit(1);
            }
        }

        Some("companies") => {
            let client = gateway_client(&settings)?;
            let companies = client.list_companies().await?;
            if companies.is_empty() {
                println!("No companies reported by the ledger system.");
            }
            for company in companies {
                println!("{}  {}", company.number, company.name);
            }
        }

        Some("list") => {
            for company in CompanyRepo::list_active(&pool).await? {
                println!(
                    "{}  {}  [{}]",
                    company.tally_company_number, company.tally_company_name, company.sync_status
                );
            }
        }

        Some("add") => {
            let (number, name) = match (args.get(1), args.get(2)) {
                (Some(number), Some(name)) => (number.as_str(), name.as_str()),
                _ => anyhow::bail!("add requires <number> and <name>"),
            };
            match CompanyRepo::add(&pool, name, number, "").await? {
                AddOutcome::Added => println!("Added company {number} ('{name}')"),
                AddOutcome::Reactivated => println!("Reactivated company {number} ('{name}')"),
                AddOutcome::Unchanged => println!("Company {number} is already active"),
            }
        }

        Some("sync") => {
            let number = args
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("sync requires a company <number>"))?;
            let company = CompanyRepo::find_by_number(&pool, number)
                .await?
                .ok_or_else(|| anyhow::anyhow!("company {number} is not in the local store"))?;

            let driver = build_driver()?;
            let engine = SyncEngine::new(pool.clone(), driver);
            let mut rx = engine.start(number, &company.tally_company_name)?;

            let mut failed = false;
            while let Some(message) = rx.recv().await {
                match message {
                    SyncMessage::Progress { step, total, label } => {
                        println!("[{step}/{total}] {label}");
                    }
                    SyncMessage::Error(text) => {
                        eprintln!("error: {text}");
                    }
                    SyncMessage::Finished { status, collections_synced } => {
                        println!("Finished: {status} ({collections_synced} collections synced)");
                        failed = status == SyncStatus::SyncFailed;
                    }
                }
            }
            if failed {
                std::process::exit(1);
            }
        }

        _ => {
            print!("{USAGE}");
        }
    }

    Ok(())
}

fn gateway_client(settings: &Settings) -> anyhow::Result<GatewayClient> {
    let port = settings
        .port()
        .ok_or_else(|| anyhow::anyhow!("invalid port '{}' in settings", settings.tally_port))?;
    Ok(GatewayClient::new(&settings.tally_host, port))
}

/// Build the production driver.
///
/// The ODBC implementation is compiled only with the `odbc` feature; a
/// default build can manage companies and talk to the gateway but cannot
/// run a sync.
#[cfg(feature = "odbc")]
fn build_driver() -> anyhow::Result<Arc<dyn TallyDriver>> {
    use tallysync_tally::driver::DriverConfig;
    use tallysync_tally::odbc::OdbcDriver;

    let mut config = DriverConfig::default();
    if let Ok(dsn) = std::env::var("TALLYSYNC_DSN") {
        config.dsn = dsn;
    }
    Ok(Arc::new(OdbcDriver::new(config)))
}

#[cfg(not(feature = "odbc"))]
fn build_driver() -> anyhow::Result<Arc<dyn TallyDriver>> {
    anyhow::bail!(
        "this build has no ODBC driver; rebuild with `--features odbc` to run a sync"
    )
}
