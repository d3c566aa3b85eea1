//! Row types shared by the SQL backends

use crate::models::RawDailyRecord;
use crate::storage::{StoreError, StoreResult};
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct UsageRow {
    pub user_id: String,
    pub traffic_bytes: i64,
    pub connections: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct DomainRow {
    pub user_id: String,
    pub domain: String,
    pub traffic_bytes: i64,
    pub connections: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct AliasRow {
    pub user_id: String,
    pub alias: String,
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_date(raw: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| StoreError::Other(anyhow::anyhow!("invalid stored date '{}': {}", raw, e)))
}

/// Lost connections and exhausted pools mean the database is unreachable,
/// not that the day's data is bad
pub(crate) fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
        other => StoreError::Other(other.into()),
    }
}

/// Stored counters are signed; anything negative is corrupt data for that day
fn counter(value: i64, date: NaiveDate, what: &str) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| StoreError::Malformed {
        date,
        reason: format!("negative {}: {}", what, value),
    })
}

pub(crate) fn to_db_counter(value: u64) -> anyhow::Result<i64> {
    i64::try_from(value).map_err(|_| anyhow::anyhow!("counter {} does not fit in BIGINT", value))
}

/// Build one record per user from the usage and domain rows of a day.
/// Users with domain rows but no usage row get a zero-total record.
pub(crate) fn records_from_rows(
    date: NaiveDate,
    usage: Vec<UsageRow>,
    domains: Vec<DomainRow>,
) -> StoreResult<Vec<RawDailyRecord>> {
    let mut records: BTreeMap<String, RawDailyRecord> = BTreeMap::new();

    for row in usage {
        let record = RawDailyRecord::new(date, row.user_id.as_str())
            .with_traffic(counter(row.traffic_bytes, date, "traffic_bytes")?)
            .with_connections(counter(row.connections, date, "connections")?);
        records.insert(row.user_id, record);
    }

    for row in domains {
        let traffic = counter(row.traffic_bytes, date, "domain traffic_bytes")?;
        let conns = counter(row.connections, date, "domain connections")?;
        let record = records
            .entry(row.user_id.clone())
            .or_insert_with(|| RawDailyRecord::new(date, row.user_id.as_str()));
        if traffic > 0 {
            record.domain_traffic.insert(row.domain.clone(), traffic);
        }
        if conns > 0 {
            record.domain_connections.insert(row.domain, conns);
        }
    }

    Ok(records.into_values().collect())
}

/// Union of a record's domain keys with both counters, for persisting
pub(crate) fn domain_pairs(record: &RawDailyRecord) -> BTreeMap<&str, (u64, u64)> {
    let mut pairs: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for (domain, bytes) in &record.domain_traffic {
        pairs.entry(domain.as_str()).or_default().0 += bytes;
    }
    for (domain, count) in &record.domain_connections {
        pairs.entry(domain.as_str()).or_default().1 += count;
    }
    pairs
}
