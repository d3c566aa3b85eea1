use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use xray_usage::analytics::{self, SnapshotEngine, SnapshotRequest};
use xray_usage::config::{Config, StoreBackend};
use xray_usage::models::RawDailyRecord;
use xray_usage::storage::{self, CsvStore, PostgresStore, RecordStore, SqliteStore};

#[derive(Parser)]
#[command(name = "xray-usage-cli")]
#[command(about = "Inspect and import Xray usage data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a dashboard snapshot as JSON
    Snapshot {
        /// Last day of the window (YYYY-MM-DD), defaults to today
        #[arg(long)]
        to: Option<String>,
        /// Window length in days
        #[arg(long)]
        days: Option<i64>,
        /// Restrict to one user
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        pretty: bool,
    },
    /// List dates that have usage data, newest first
    Dates,
    /// Print lifetime totals per user
    AllTime,
    /// Copy a collector CSV directory into the configured database
    Import {
        /// Directory holding usage_/conns_/report_/domains_ files
        #[arg(long)]
        from: PathBuf,
        /// Aliases JSON file to import alongside
        #[arg(long)]
        aliases: Option<PathBuf>,
    },
}

enum SqlTarget {
    Sqlite(SqliteStore),
    Postgres(PostgresStore),
}

impl SqlTarget {
    async fn upsert_record(&self, record: &RawDailyRecord) -> Result<()> {
        match self {
            SqlTarget::Sqlite(store) => store.upsert_record(record).await,
            SqlTarget::Postgres(store) => store.upsert_record(record).await,
        }
    }

    async fn set_alias(&self, user_id: &str, alias: &str) -> Result<()> {
        match self {
            SqlTarget::Sqlite(store) => store.set_alias(user_id, alias).await,
            SqlTarget::Postgres(store) => store.set_alias(user_id, alias).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let today = chrono::Utc::now().date_naive();

    match cli.command {
        Commands::Snapshot {
            to,
            days,
            user,
            pretty,
        } => {
            let settings = config.engine.settings();
            let request = SnapshotRequest::from_params(
                to.as_deref(),
                days,
                user.as_deref(),
                today,
                &settings,
            )?;
            let store = storage::open_store(&config.store).await?;
            let engine = SnapshotEngine::new(store, settings);
            let snapshot = engine.snapshot(&request).await?;

            let json = if pretty {
                serde_json::to_string_pretty(&snapshot)?
            } else {
                serde_json::to_string(&snapshot)?
            };
            println!("{}", json);
        }
        Commands::Dates => {
            let store = storage::open_store(&config.store).await?;
            let dates = analytics::available_dates(&store, today).await?;
            for date in dates {
                println!("{}", date);
            }
        }
        Commands::AllTime => {
            let store = storage::open_store(&config.store).await?;
            let stats = analytics::all_time_stats(&store).await?;
            if stats.users.is_empty() {
                println!("No usage recorded.");
            } else {
                println!(
                    "{:<36} {:<20} {:>16} {:>12} {:>6}",
                    "User", "Alias", "Traffic (bytes)", "Conns", "Days"
                );
                println!("{}", "-".repeat(94));
                for user in stats.users {
                    println!(
                        "{:<36} {:<20} {:>16} {:>12} {:>6}",
                        user.user_id,
                        user.alias.unwrap_or_default(),
                        user.traffic_bytes,
                        user.conns,
                        user.days
                    );
                }
            }
        }
        Commands::Import { from, aliases } => {
            let target = match config.store.backend {
                StoreBackend::Sqlite => SqlTarget::Sqlite(
                    SqliteStore::new(&config.store.database_url, config.store.max_connections)
                        .await?,
                ),
                StoreBackend::Postgres => SqlTarget::Postgres(
                    PostgresStore::new(&config.store.database_url, config.store.max_connections)
                        .await?,
                ),
                StoreBackend::Csv => {
                    anyhow::bail!("import needs STORE_BACKEND=sqlite or postgres")
                }
            };
            match &target {
                SqlTarget::Sqlite(store) => store.init().await?,
                SqlTarget::Postgres(store) => store.init().await?,
            }

            let source: Arc<dyn RecordStore> = Arc::new(CsvStore::new(&from, aliases));
            source
                .ping()
                .await
                .with_context(|| format!("cannot read {}", from.display()))?;

            let mut imported_days = 0usize;
            let mut imported_records = 0usize;
            for date in source.list_dates().await? {
                match source.load_day(date).await {
                    Ok(records) => {
                        for record in &records {
                            target.upsert_record(record).await?;
                        }
                        imported_days += 1;
                        imported_records += records.len();
                    }
                    Err(e) => println!("⚠ Skipped {}: {}", date, e),
                }
            }

            let alias_map = source.aliases().await?;
            for (user_id, alias) in &alias_map {
                target.set_alias(user_id, alias).await?;
            }

            println!(
                "✓ Imported {} records over {} days and {} aliases",
                imported_records,
                imported_days,
                alias_map.len()
            );
        }
    }

    Ok(())
}
