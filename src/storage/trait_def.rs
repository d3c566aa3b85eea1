use crate::models::RawDailyRecord;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached at all
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    /// Data for one day exists but cannot be read
    #[error("malformed data for {date}: {reason}")]
    Malformed { date: NaiveDate, reason: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read-only source of daily usage records.
///
/// Implementations return at most one record per (user, day); a day with no
/// data is an empty vector, not an error.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Initialize the store (create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Check that the store is reachable
    async fn ping(&self) -> StoreResult<()>;

    /// All records for one calendar day
    async fn load_day(&self, date: NaiveDate) -> StoreResult<Vec<RawDailyRecord>>;

    /// Every day the store holds usage data for, ascending
    async fn list_dates(&self) -> StoreResult<Vec<NaiveDate>>;

    /// Registered users and their display aliases (empty alias allowed)
    async fn aliases(&self) -> StoreResult<BTreeMap<String, String>>;
}
