use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::analytics::anomaly::{DEFAULT_MULTIPLIER, DEFAULT_NEW_USER_FLOOR_BYTES};
use crate::analytics::domains::DEFAULT_TOP_N;
use crate::analytics::snapshot::{DEFAULT_MAX_WINDOW_DAYS, DEFAULT_WINDOW_DAYS};
use crate::analytics::{AnomalyRule, EngineSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub api_server: ServerConfig,
    pub engine: EngineConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Directory the collector writes daily CSV files into
    pub usage_dir: String,
    /// JSON file mapping user id to display alias
    pub aliases_path: Option<String>,
    pub database_url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Csv,
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allow_any: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub default_window_days: usize,
    pub max_window_days: usize,
    pub top_domains: usize,
    pub anomaly_multiplier: f64,
    pub anomaly_floor_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: u64,
    /// Background refresh of the default snapshot; 0 disables it
    pub refresh_interval_secs: u64,
}

impl EngineConfig {
    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            top_n: self.top_domains,
            anomaly: AnomalyRule {
                multiplier: self.anomaly_multiplier,
                new_user_floor_bytes: self.anomaly_floor_bytes,
            },
            default_window_days: self.default_window_days,
            max_window_days: self.max_window_days,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_window_days: DEFAULT_WINDOW_DAYS,
            max_window_days: DEFAULT_MAX_WINDOW_DAYS,
            top_domains: DEFAULT_TOP_N,
            anomaly_multiplier: DEFAULT_MULTIPLIER,
            anomaly_floor_bytes: DEFAULT_NEW_USER_FLOOR_BYTES,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30,
            max_entries: 256,
            refresh_interval_secs: 30,
        }
    }
}

/// Parse an optional environment variable, naming it in the error
fn env_parse<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {name}: '{raw}'")),
        _ => Ok(default),
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str = std::env::var("STORE_BACKEND").unwrap_or_else(|_| "csv".to_string());
        let backend = match backend_str.to_lowercase().as_str() {
            "csv" => StoreBackend::Csv,
            "sqlite" => StoreBackend::Sqlite,
            "postgres" | "postgresql" => StoreBackend::Postgres,
            other => {
                tracing::warn!(
                    "Unknown STORE_BACKEND '{other}', falling back to 'csv'. Supported values: csv, sqlite, postgres"
                );
                StoreBackend::Csv
            }
        };

        let usage_dir =
            std::env::var("USAGE_DIR").unwrap_or_else(|_| "/var/log/xray/usage".to_string());
        let aliases_path = std::env::var("ALIASES_PATH").ok().filter(|p| !p.is_empty());
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./xray-usage.db".to_string());
        let max_connections = env_parse("DATABASE_MAX_CONNECTIONS", 5u32)?;

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = env_parse("API_PORT", 8090u16)?;

        let engine_defaults = EngineConfig::default();
        let engine = EngineConfig {
            default_window_days: env_parse(
                "DEFAULT_WINDOW_DAYS",
                engine_defaults.default_window_days,
            )?,
            max_window_days: env_parse("MAX_WINDOW_DAYS", engine_defaults.max_window_days)?,
            top_domains: env_parse("TOP_DOMAINS", engine_defaults.top_domains)?,
            anomaly_multiplier: env_parse(
                "ANOMALY_MULTIPLIER",
                engine_defaults.anomaly_multiplier,
            )?,
            anomaly_floor_bytes: env_parse(
                "ANOMALY_FLOOR_BYTES",
                engine_defaults.anomaly_floor_bytes,
            )?,
        };

        if engine.default_window_days == 0 || engine.default_window_days > engine.max_window_days
        {
            anyhow::bail!(
                "DEFAULT_WINDOW_DAYS must be between 1 and MAX_WINDOW_DAYS ({})",
                engine.max_window_days
            );
        }
        if !(engine.anomaly_multiplier.is_finite() && engine.anomaly_multiplier > 0.0) {
            anyhow::bail!("ANOMALY_MULTIPLIER must be a positive number");
        }

        let cache_defaults = CacheConfig::default();
        let cache = CacheConfig {
            ttl_secs: env_parse("SNAPSHOT_CACHE_TTL_SECS", cache_defaults.ttl_secs)?,
            max_entries: env_parse("SNAPSHOT_CACHE_MAX_ENTRIES", cache_defaults.max_entries)?,
            refresh_interval_secs: env_parse(
                "SNAPSHOT_REFRESH_SECS",
                cache_defaults.refresh_interval_secs,
            )?,
        };

        Ok(Config {
            store: StoreConfig {
                backend,
                usage_dir,
                aliases_path,
                database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
                cors_allow_any: env_flag("CORS_ALLOW_ANY"),
            },
            engine,
            cache,
        })
    }
}
