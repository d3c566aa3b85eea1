pub mod csv_dir;
pub mod postgres;
mod rows;
pub mod sqlite;
pub mod trait_def;

pub use csv_dir::CsvStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
pub use trait_def::{RecordStore, StoreError, StoreResult};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};

/// Open and initialize the configured record store
pub async fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match config.backend {
        StoreBackend::Csv => {
            info!("Using CSV usage directory: {}", config.usage_dir);
            Arc::new(CsvStore::new(
                &config.usage_dir,
                config.aliases_path.as_ref().map(PathBuf::from),
            ))
        }
        StoreBackend::Sqlite => {
            info!("Using SQLite store: {}", config.database_url);
            Arc::new(SqliteStore::new(&config.database_url, config.max_connections).await?)
        }
        StoreBackend::Postgres => {
            info!("Using PostgreSQL store: {}", config.database_url);
            Arc::new(PostgresStore::new(&config.database_url, config.max_connections).await?)
        }
    };

    store.init().await?;
    Ok(store)
}
