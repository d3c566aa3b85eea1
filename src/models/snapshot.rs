//! Output contract of the aggregation engine
//!
//! A [`DashboardSnapshot`] is built fresh for every request and never
//! mutated afterwards, so it can be shared behind an `Arc` by any number of
//! readers. Field names follow the JSON the dashboard already consumes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Percentage change between the current and previous 7-day windows.
///
/// Serialized as a tagged object so that "no signal" and "new activity"
/// never collapse into a plain number:
/// `{"kind":"value","value":12.5}`, `{"kind":"new"}`, `{"kind":"none"}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeltaPct {
    /// No previous window, or both windows are zero
    None,
    /// Previous window was zero and current window has activity
    New,
    /// Finite change, rounded to 2 decimals
    Value { value: f64 },
}

impl DeltaPct {
    pub fn value(&self) -> Option<f64> {
        match self {
            DeltaPct::Value { value } => Some(*value),
            _ => None,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, DeltaPct::New)
    }
}

/// One entry of a top-N domain ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDomain {
    /// Lowercased, trimmed domain
    pub domain: String,
    pub value: u64,
    /// Share of the total over all domains (0..100), 2 decimals
    pub pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataCompleteness {
    Full,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub to: NaiveDate,
    pub window_days: usize,
    pub user_filter: Option<String>,
    pub current_window: DateSpan,
    /// `None` when the window is shorter than two 7-day spans
    pub previous_window: Option<DateSpan>,
    pub data_completeness: DataCompleteness,
    /// Days with no usable records (absent or degraded)
    pub missing_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub daily_traffic_bytes: Vec<u64>,
    pub daily_conns: Vec<u64>,
    pub cumulative_traffic_bytes: Vec<u64>,
    pub cumulative_conns: Vec<u64>,
    pub sum7_traffic_bytes: u64,
    pub sum_prev7_traffic_bytes: u64,
    pub delta_traffic_pct: DeltaPct,
    pub sum7_conns: u64,
    pub sum_prev7_conns: u64,
    pub delta_conns_pct: DeltaPct,
    pub top_domains_traffic: Vec<RankedDomain>,
    pub top_domains_conns: Vec<RankedDomain>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub daily_traffic_bytes: Vec<u64>,
    pub daily_conns: Vec<u64>,
    pub sum7_traffic_bytes: u64,
    pub sum_prev7_traffic_bytes: u64,
    pub delta_traffic_pct: DeltaPct,
    pub sum7_conns: u64,
    pub sum_prev7_conns: u64,
    pub delta_conns_pct: DeltaPct,
    pub top_domains_traffic: Vec<RankedDomain>,
    pub top_domains_conns: Vec<RankedDomain>,
    pub anomaly: bool,
}

/// Headline numbers for the dashboard cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    pub today_traffic_bytes: u64,
    pub yesterday_traffic_bytes: u64,
    pub delta_today_traffic_pct: DeltaPct,
    /// Mean over the 7 days before the last day of the window
    pub avg7_traffic_bytes: u64,
    pub today_conns: u64,
    pub yesterday_conns: u64,
    pub delta_today_conns_pct: DeltaPct,
    pub avg7_conns: u64,
    pub total_traffic_bytes: u64,
    pub total_users: usize,
    pub active_users: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub meta: SnapshotMeta,
    /// Ascending, one entry per day of the window
    pub dates: Vec<NaiveDate>,
    pub global: GlobalStats,
    pub users: BTreeMap<String, UserStats>,
    pub kpi: KpiSummary,
}

/// All-time totals for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllTimeUserStats {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub traffic_bytes: u64,
    pub conns: u64,
    /// Days with a traffic record
    pub days: usize,
    pub top_domains_traffic: Vec<RankedDomain>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllTimeStats {
    pub users: Vec<AllTimeUserStats>,
}
