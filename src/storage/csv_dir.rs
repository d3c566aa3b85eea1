//! Read-only store over the collector's daily CSV files
//!
//! The collector writes one set of files per day into a single directory:
//!
//! - `usage_YYYY-MM-DD.csv`: `user`, `total_bytes` (or `uplink_bytes` + `downlink_bytes`)
//! - `conns_YYYY-MM-DD.csv`: `user`, `dst`, `conn_count`
//! - `report_YYYY-MM-DD.csv`: `user`, `dst`, `traffic_bytes`
//! - `domains_YYYY-MM-DD.csv`: `dst`, `domain` (IP to hostname map)
//!
//! Several rows for the same user on the same day are summed into one record.

use crate::models::RawDailyRecord;
use crate::storage::{RecordStore, StoreError, StoreResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const USAGE_PREFIX: &str = "usage";
const CONNS_PREFIX: &str = "conns";
const REPORT_PREFIX: &str = "report";
const DOMAINS_PREFIX: &str = "domains";

pub struct CsvStore {
    usage_dir: PathBuf,
    aliases_path: Option<PathBuf>,
}

impl CsvStore {
    pub fn new(usage_dir: impl Into<PathBuf>, aliases_path: Option<PathBuf>) -> Self {
        Self {
            usage_dir: usage_dir.into(),
            aliases_path,
        }
    }

    pub fn usage_dir(&self) -> &Path {
        &self.usage_dir
    }

    fn day_file(&self, prefix: &str, date: NaiveDate) -> PathBuf {
        self.usage_dir
            .join(format!("{}_{}.csv", prefix, date.format("%Y-%m-%d")))
    }

    /// Dated files with the given prefix, ascending by date
    async fn dated_files(&self, prefix: &str) -> StoreResult<Vec<(NaiveDate, PathBuf)>> {
        let mut entries = tokio::fs::read_dir(&self.usage_dir)
            .await
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", self.usage_dir.display(), e)))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Other(e.into()))?
        {
            let name = entry.file_name();
            if let Some(date) = parse_dated_name(&name.to_string_lossy(), prefix) {
                files.push((date, entry.path()));
            }
        }
        files.sort();
        Ok(files)
    }

    /// IP to hostname map from the newest domains file dated on or before `date`,
    /// falling back to the newest file overall
    async fn domains_map(&self, date: NaiveDate) -> StoreResult<HashMap<String, String>> {
        let files = self.dated_files(DOMAINS_PREFIX).await?;
        let pick = files
            .iter()
            .rev()
            .find(|(d, _)| *d <= date)
            .or_else(|| files.last());

        let mut map = HashMap::new();
        let Some((picked, path)) = pick else {
            return Ok(map);
        };
        let Some(rows) = read_rows(path, *picked).await? else {
            return Ok(map);
        };
        for row in rows {
            let dst = row.text(&["dst", "ip"]);
            let domain = row.text(&["domain"]);
            if !dst.is_empty() && !domain.is_empty() {
                map.insert(dst.to_string(), domain.to_string());
            }
        }
        Ok(map)
    }
}

#[async_trait]
impl RecordStore for CsvStore {
    async fn init(&self) -> Result<()> {
        // The collector owns the directory; nothing to create
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        match tokio::fs::metadata(&self.usage_dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(StoreError::Unavailable(format!(
                "{} is not a directory",
                self.usage_dir.display()
            ))),
            Err(e) => Err(StoreError::Unavailable(format!(
                "{}: {}",
                self.usage_dir.display(),
                e
            ))),
        }
    }

    async fn load_day(&self, date: NaiveDate) -> StoreResult<Vec<RawDailyRecord>> {
        let usage = read_rows(&self.day_file(USAGE_PREFIX, date), date).await?;
        let conns = read_rows(&self.day_file(CONNS_PREFIX, date), date).await?;
        let report = read_rows(&self.day_file(REPORT_PREFIX, date), date).await?;

        if usage.is_none() && conns.is_none() && report.is_none() {
            debug!("No collector files for {}", date);
            return Ok(Vec::new());
        }

        let domains = self.domains_map(date).await?;
        let to_domain = |dst: &str| -> String {
            domains
                .get(dst)
                .cloned()
                .unwrap_or_else(|| dst.to_string())
        };

        let mut records: BTreeMap<String, RawDailyRecord> = BTreeMap::new();

        for row in usage.iter().flatten() {
            let user = row.text(&["user", "email"]);
            if user.is_empty() {
                continue;
            }
            let bytes = match row.number(&["total_bytes", "bytes"], date)? {
                Some(total) => total,
                None => {
                    let up = row.number(&["uplink_bytes", "up_bytes"], date)?.unwrap_or(0);
                    let down = row.number(&["downlink_bytes", "down_bytes"], date)?.unwrap_or(0);
                    up.saturating_add(down)
                }
            };
            let record = record_for(&mut records, date, user);
            record.traffic_bytes = record.traffic_bytes.saturating_add(bytes);
        }

        if let Some(rows) = &conns {
            for row in rows {
                let user = row.text(&["user"]);
                if user.is_empty() {
                    continue;
                }
                let count = row
                    .number(&["conn_count", "conns", "count"], date)?
                    .unwrap_or(0);
                let dst = row.text(&["dst"]);
                let record = record_for(&mut records, date, user);
                record.connections = record.connections.saturating_add(count);
                if count > 0 && !dst.is_empty() {
                    let entry = record.domain_connections.entry(to_domain(dst)).or_insert(0);
                    *entry = entry.saturating_add(count);
                }
            }
        } else if let Some(rows) = &report {
            // No connection log for the day: each distinct (user, dst) pair
            // in the report counts as one connection
            let pairs: BTreeSet<(&str, &str)> = rows
                .iter()
                .map(|row| (row.text(&["user"]), row.text(&["dst"])))
                .filter(|(user, dst)| !user.is_empty() && !dst.is_empty())
                .collect();
            for (user, dst) in pairs {
                let record = record_for(&mut records, date, user);
                record.connections = record.connections.saturating_add(1);
                let entry = record.domain_connections.entry(to_domain(dst)).or_insert(0);
                *entry = entry.saturating_add(1);
            }
        }

        for row in report.iter().flatten() {
            let user = row.text(&["user"]);
            let dst = row.text(&["dst"]);
            if user.is_empty() || dst.is_empty() {
                continue;
            }
            let bytes = row.number(&["traffic_bytes"], date)?.unwrap_or(0);
            let record = record_for(&mut records, date, user);
            let entry = record.domain_traffic.entry(to_domain(dst)).or_insert(0);
            *entry = entry.saturating_add(bytes);
        }

        Ok(records.into_values().collect())
    }

    async fn list_dates(&self) -> StoreResult<Vec<NaiveDate>> {
        let mut dates = BTreeSet::new();
        for prefix in [USAGE_PREFIX, CONNS_PREFIX, REPORT_PREFIX] {
            dates.extend(self.dated_files(prefix).await?.into_iter().map(|(d, _)| d));
        }
        Ok(dates.into_iter().collect())
    }

    async fn aliases(&self) -> StoreResult<BTreeMap<String, String>> {
        let Some(path) = &self.aliases_path else {
            return Ok(BTreeMap::new());
        };
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StoreError::Other(anyhow::anyhow!("invalid aliases file {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StoreError::Other(e.into())),
        }
    }
}

fn record_for<'m>(
    records: &'m mut BTreeMap<String, RawDailyRecord>,
    date: NaiveDate,
    user: &str,
) -> &'m mut RawDailyRecord {
    records
        .entry(user.to_string())
        .or_insert_with(|| RawDailyRecord::new(date, user))
}

/// `usage_2025-01-31.csv` -> 2025-01-31 for prefix `usage`
fn parse_dated_name(name: &str, prefix: &str) -> Option<NaiveDate> {
    let stem = name.strip_prefix(prefix)?.strip_prefix('_')?.strip_suffix(".csv")?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

/// One CSV row keyed by header
struct Row(HashMap<String, String>);

impl Row {
    /// First non-empty value among `keys`, trimmed
    fn text(&self, keys: &[&str]) -> &str {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
            .unwrap_or("")
    }

    /// Non-negative integer; the collector sometimes writes `123.0`
    fn number(&self, keys: &[&str], date: NaiveDate) -> StoreResult<Option<u64>> {
        let raw = self.text(keys);
        if raw.is_empty() {
            return Ok(None);
        }
        if let Ok(v) = raw.parse::<u64>() {
            return Ok(Some(v));
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Ok(Some(v as u64)),
            _ => Err(StoreError::Malformed {
                date,
                reason: format!("invalid number '{}' in column {}", raw, keys[0]),
            }),
        }
    }
}

/// Rows of a CSV file, `None` when the file does not exist
async fn read_rows(path: &Path, date: NaiveDate) -> StoreResult<Option<Vec<Row>>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::Other(e.into())),
    };

    let mut reader = ::csv::ReaderBuilder::new()
        .trim(::csv::Trim::All)
        .flexible(true)
        .from_reader(bytes.as_slice());

    let mut rows = Vec::new();
    for result in reader.deserialize::<HashMap<String, String>>() {
        let row = result.map_err(|e| StoreError::Malformed {
            date,
            reason: format!("{}: {}", path.display(), e),
        })?;
        rows.push(Row(row));
    }
    Ok(Some(rows))
}
