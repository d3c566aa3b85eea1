//! Snapshot assembly
//!
//! [`SnapshotEngine::snapshot`] reads the window's days from the record
//! store and hands them to [`assemble`], a pure function of its inputs.
//! Nothing is cached or mutated between calls.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::analytics::anomaly::AnomalyRule;
use crate::analytics::domains::{rank_domains, DEFAULT_TOP_N};
use crate::analytics::series::{date_axis, AlignedDays, UserSeries};
use crate::analytics::window::{delta_pct, WindowStats, SUB_WINDOW_DAYS};
use crate::error::{EngineError, EngineResult, InputError};
use crate::models::{
    DashboardSnapshot, DataCompleteness, DateSpan, GlobalStats, KpiSummary, RawDailyRecord,
    SnapshotMeta, UserStats,
};
use crate::storage::{RecordStore, StoreError};

pub const DEFAULT_WINDOW_DAYS: usize = 14;
pub const DEFAULT_MAX_WINDOW_DAYS: usize = 366;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub top_n: usize,
    pub anomaly: AnomalyRule,
    pub default_window_days: usize,
    pub max_window_days: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            anomaly: AnomalyRule::default(),
            default_window_days: DEFAULT_WINDOW_DAYS,
            max_window_days: DEFAULT_MAX_WINDOW_DAYS,
        }
    }
}

/// Validated `(window, end date, user filter)` triple
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotRequest {
    window_days: usize,
    to: NaiveDate,
    user: Option<String>,
}

impl SnapshotRequest {
    pub fn new(
        window_days: i64,
        to: NaiveDate,
        user: Option<String>,
        max_window_days: usize,
    ) -> Result<Self, InputError> {
        let window_days = usize::try_from(window_days)
            .ok()
            .filter(|w| (1..=max_window_days).contains(w))
            .ok_or(InputError::InvalidWindow {
                got: window_days,
                max: max_window_days,
            })?;

        let user = user
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        Ok(Self {
            window_days,
            to,
            user,
        })
    }

    /// Build a request from raw boundary parameters. Missing values fall
    /// back to `today` and the configured default window.
    pub fn from_params(
        to: Option<&str>,
        days: Option<i64>,
        user: Option<&str>,
        today: NaiveDate,
        settings: &EngineSettings,
    ) -> Result<Self, InputError> {
        let to = match to.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => parse_day(raw)?,
            None => today,
        };
        let days = days.unwrap_or(settings.default_window_days as i64);
        Self::new(days, to, user.map(str::to_string), settings.max_window_days)
    }

    pub fn window_days(&self) -> usize {
        self.window_days
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        date_axis(self.to, self.window_days)
    }
}

pub fn parse_day(raw: &str) -> Result<NaiveDate, InputError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| InputError::MalformedDate(raw.to_string()))
}

/// Records the store returned for one day
#[derive(Debug, Clone, PartialEq)]
pub struct DayBatch {
    pub date: NaiveDate,
    pub records: Vec<RawDailyRecord>,
    /// The day could not be read and counts as all-zero
    pub degraded: bool,
}

impl DayBatch {
    pub fn loaded(date: NaiveDate, records: Vec<RawDailyRecord>) -> Self {
        Self {
            date,
            records,
            degraded: false,
        }
    }

    pub fn degraded(date: NaiveDate) -> Self {
        Self {
            date,
            records: Vec::new(),
            degraded: true,
        }
    }

    fn is_missing(&self) -> bool {
        self.degraded || self.records.is_empty()
    }
}

pub struct SnapshotEngine {
    store: Arc<dyn RecordStore>,
    settings: EngineSettings,
}

impl SnapshotEngine {
    pub fn new(store: Arc<dyn RecordStore>, settings: EngineSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub async fn snapshot(&self, request: &SnapshotRequest) -> EngineResult<DashboardSnapshot> {
        self.store
            .ping()
            .await
            .map_err(|e| EngineError::UpstreamUnavailable(e.to_string()))?;

        let days = load_days(&self.store, &request.dates()).await?;

        let aliases = match self.store.aliases().await {
            Ok(aliases) => aliases,
            Err(StoreError::Unavailable(reason)) => {
                return Err(EngineError::UpstreamUnavailable(reason))
            }
            Err(e) => {
                warn!("Failed to load user aliases, continuing without them: {}", e);
                BTreeMap::new()
            }
        };

        Ok(assemble(request, &self.settings, &days, &aliases)?)
    }
}

/// Load every day concurrently. A day that fails to load degrades to
/// all-zero; only a store that fails for every day is an error.
pub async fn load_days(
    store: &Arc<dyn RecordStore>,
    dates: &[NaiveDate],
) -> EngineResult<Vec<DayBatch>> {
    let mut tasks = JoinSet::new();
    for (i, date) in dates.iter().copied().enumerate() {
        let store = Arc::clone(store);
        tasks.spawn(async move { (i, date, store.load_day(date).await) });
    }

    let mut slots: Vec<Option<DayBatch>> = vec![None; dates.len()];
    let mut unavailable = 0usize;
    let mut last_unavailable = String::new();

    while let Some(joined) = tasks.join_next().await {
        let (i, date, result) = joined.map_err(|e| EngineError::Other(e.into()))?;
        let batch = match result {
            Ok(records) => {
                if records.is_empty() {
                    debug!("No usage records for {}", date);
                }
                DayBatch::loaded(date, records)
            }
            Err(e) => {
                if let StoreError::Unavailable(reason) = &e {
                    unavailable += 1;
                    last_unavailable = reason.clone();
                }
                warn!("Treating {} as empty: {}", date, e);
                DayBatch::degraded(date)
            }
        };
        slots[i] = Some(batch);
    }

    if !dates.is_empty() && unavailable == dates.len() {
        return Err(EngineError::UpstreamUnavailable(last_unavailable));
    }

    Ok(slots
        .into_iter()
        .zip(dates)
        .map(|(slot, date)| slot.unwrap_or_else(|| DayBatch::degraded(*date)))
        .collect())
}

/// Build the snapshot for `request` from already-loaded days.
///
/// Known users are everyone with a record in the window plus every
/// registered alias. With a user filter, `users` holds only that user and
/// the global series is the sum over it.
pub fn assemble(
    request: &SnapshotRequest,
    settings: &EngineSettings,
    days: &[DayBatch],
    aliases: &BTreeMap<String, String>,
) -> Result<DashboardSnapshot, InputError> {
    let dates = request.dates();
    let window = dates.len();

    let mut known: BTreeSet<String> = days
        .iter()
        .flat_map(|d| d.records.iter().map(|r| r.user_id.clone()))
        .collect();
    known.extend(aliases.keys().cloned());

    let users = match request.user() {
        Some(user) if known.contains(user) => BTreeSet::from([user.to_string()]),
        Some(user) => return Err(InputError::UnknownUser(user.to_string())),
        None => known,
    };

    let aligned = AlignedDays::align(
        dates.clone(),
        &users,
        days.iter().flat_map(|d| d.records.iter()),
    );
    let per_user = aligned.user_series();
    let global = aligned.global_series(per_user.values());

    assert_eq!(global.len(), window, "global series length differs from window");
    for (user, series) in &per_user {
        assert_eq!(
            series.len(),
            window,
            "series for user '{user}' differs from window length"
        );
    }

    let users_out: BTreeMap<String, UserStats> = per_user
        .iter()
        .map(|(user, series)| {
            let stats = user_stats(
                series,
                aligned.records_for(user),
                aliases.get(user),
                settings,
            );
            (user.clone(), stats)
        })
        .collect();

    let global_out = global_stats(&global, aligned.all_records(), settings);

    let missing_dates: Vec<NaiveDate> = days
        .iter()
        .filter(|d| d.is_missing())
        .map(|d| d.date)
        .collect();

    let meta = SnapshotMeta {
        to: request.to(),
        window_days: window,
        user_filter: request.user().map(str::to_string),
        current_window: DateSpan {
            from: dates[window.saturating_sub(SUB_WINDOW_DAYS)],
            to: dates[window - 1],
        },
        previous_window: (window >= 2 * SUB_WINDOW_DAYS).then(|| DateSpan {
            from: dates[window - 2 * SUB_WINDOW_DAYS],
            to: dates[window - SUB_WINDOW_DAYS - 1],
        }),
        data_completeness: if missing_dates.is_empty() {
            DataCompleteness::Full
        } else {
            DataCompleteness::Partial
        },
        missing_dates,
    };

    let kpi = kpi_summary(&global, &per_user);

    Ok(DashboardSnapshot {
        meta,
        dates,
        global: global_out,
        users: users_out,
        kpi,
    })
}

fn user_stats<'a>(
    series: &UserSeries,
    records: impl Iterator<Item = &'a RawDailyRecord> + Clone,
    alias: Option<&String>,
    settings: &EngineSettings,
) -> UserStats {
    let traffic = WindowStats::compute(&series.daily_traffic_bytes);
    let conns = WindowStats::compute(&series.daily_connections);

    UserStats {
        alias: alias.filter(|a| !a.trim().is_empty()).cloned(),
        daily_traffic_bytes: series.daily_traffic_bytes.clone(),
        daily_conns: series.daily_connections.clone(),
        sum7_traffic_bytes: traffic.sum_current_7d,
        sum_prev7_traffic_bytes: traffic.sum_previous_7d,
        delta_traffic_pct: traffic.delta_pct,
        sum7_conns: conns.sum_current_7d,
        sum_prev7_conns: conns.sum_previous_7d,
        delta_conns_pct: conns.delta_pct,
        top_domains_traffic: rank_domains(records.clone().map(|r| &r.domain_traffic), settings.top_n),
        top_domains_conns: rank_domains(records.map(|r| &r.domain_connections), settings.top_n),
        anomaly: settings
            .anomaly
            .is_anomalous(traffic.sum_current_7d, traffic.sum_previous_7d),
    }
}

fn global_stats<'a>(
    series: &UserSeries,
    records: impl Iterator<Item = &'a RawDailyRecord> + Clone,
    settings: &EngineSettings,
) -> GlobalStats {
    let traffic = WindowStats::compute(&series.daily_traffic_bytes);
    let conns = WindowStats::compute(&series.daily_connections);

    GlobalStats {
        daily_traffic_bytes: series.daily_traffic_bytes.clone(),
        daily_conns: series.daily_connections.clone(),
        cumulative_traffic_bytes: series.cumulative_traffic_bytes(),
        cumulative_conns: series.cumulative_connections(),
        sum7_traffic_bytes: traffic.sum_current_7d,
        sum_prev7_traffic_bytes: traffic.sum_previous_7d,
        delta_traffic_pct: traffic.delta_pct,
        sum7_conns: conns.sum_current_7d,
        sum_prev7_conns: conns.sum_previous_7d,
        delta_conns_pct: conns.delta_pct,
        top_domains_traffic: rank_domains(records.clone().map(|r| &r.domain_traffic), settings.top_n),
        top_domains_conns: rank_domains(records.map(|r| &r.domain_connections), settings.top_n),
    }
}

fn kpi_summary(global: &UserSeries, per_user: &BTreeMap<String, UserSeries>) -> KpiSummary {
    let traffic = &global.daily_traffic_bytes;
    let conns = &global.daily_connections;
    let last = traffic.len().saturating_sub(1);

    let at = |values: &[u64], i: Option<usize>| i.and_then(|i| values.get(i)).copied().unwrap_or(0);
    let today = Some(last);
    let yesterday = last.checked_sub(1);

    // The 7 days before the last one, as far as the window reaches
    let avg7 = |values: &[u64]| {
        let start = last.saturating_sub(SUB_WINDOW_DAYS);
        saturating_sum(&values[start..last]) / SUB_WINDOW_DAYS as u64
    };

    let today_traffic = at(traffic, today);
    let yesterday_traffic = at(traffic, yesterday);
    let today_conns = at(conns, today);
    let yesterday_conns = at(conns, yesterday);

    KpiSummary {
        today_traffic_bytes: today_traffic,
        yesterday_traffic_bytes: yesterday_traffic,
        delta_today_traffic_pct: delta_pct(today_traffic, yesterday_traffic),
        avg7_traffic_bytes: avg7(traffic),
        today_conns,
        yesterday_conns,
        delta_today_conns_pct: delta_pct(today_conns, yesterday_conns),
        avg7_conns: avg7(conns),
        total_traffic_bytes: saturating_sum(traffic),
        total_users: per_user.len(),
        active_users: per_user
            .values()
            .filter(|s| s.daily_traffic_bytes.iter().any(|v| *v > 0))
            .count(),
    }
}

fn saturating_sum(values: &[u64]) -> u64 {
    values.iter().fold(0u64, |acc, v| acc.saturating_add(*v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeltaPct;

    fn day(s: &str) -> NaiveDate {
        parse_day(s).unwrap()
    }

    fn request(days: i64, to: &str, user: Option<&str>) -> SnapshotRequest {
        SnapshotRequest::new(days, day(to), user.map(str::to_string), DEFAULT_MAX_WINDOW_DAYS)
            .unwrap()
    }

    /// One batch per date, each user given a flat daily traffic value
    fn flat_days(to: &str, window: usize, users: &[(&str, u64)]) -> Vec<DayBatch> {
        date_axis(day(to), window)
            .into_iter()
            .map(|d| {
                let records = users
                    .iter()
                    .map(|(u, v)| RawDailyRecord::new(d, *u).with_traffic(*v).with_connections(1))
                    .collect();
                DayBatch::loaded(d, records)
            })
            .collect()
    }

    #[test]
    fn test_request_rejects_bad_windows() {
        let to = day("2025-01-14");
        assert!(matches!(
            SnapshotRequest::new(0, to, None, 366),
            Err(InputError::InvalidWindow { got: 0, .. })
        ));
        assert!(SnapshotRequest::new(-3, to, None, 366).is_err());
        assert!(SnapshotRequest::new(367, to, None, 366).is_err());
        assert!(SnapshotRequest::new(366, to, None, 366).is_ok());
    }

    #[test]
    fn test_request_from_params_defaults_and_date_errors() {
        let settings = EngineSettings::default();
        let today = day("2025-06-01");

        let req = SnapshotRequest::from_params(None, None, Some("  "), today, &settings).unwrap();
        assert_eq!(req.to(), today);
        assert_eq!(req.window_days(), DEFAULT_WINDOW_DAYS);
        assert_eq!(req.user(), None);

        let err = SnapshotRequest::from_params(Some("2025-13-01"), None, None, today, &settings)
            .unwrap_err();
        assert_eq!(err, InputError::MalformedDate("2025-13-01".to_string()));
    }

    #[test]
    fn test_two_flat_users_sum_into_global() {
        let req = request(14, "2025-01-14", None);
        let days = flat_days("2025-01-14", 14, &[("alice", 100), ("bob", 100)]);

        let snap = assemble(&req, &EngineSettings::default(), &days, &BTreeMap::new()).unwrap();

        assert_eq!(snap.dates.len(), 14);
        assert_eq!(snap.global.daily_traffic_bytes, vec![200; 14]);
        assert_eq!(snap.global.sum7_traffic_bytes, 1400);
        assert_eq!(snap.global.sum_prev7_traffic_bytes, 1400);
        assert_eq!(snap.global.delta_traffic_pct, DeltaPct::Value { value: 0.0 });
        assert_eq!(snap.users.len(), 2);
        assert_eq!(snap.meta.data_completeness, DataCompleteness::Full);
    }

    #[test]
    fn test_new_user_activity_is_flagged_as_new() {
        let dates = date_axis(day("2025-01-14"), 14);
        let traffic = [0u64, 0, 0, 0, 0, 0, 0, 10, 20, 30, 10, 20, 30, 10];
        let days: Vec<DayBatch> = dates
            .iter()
            .zip(traffic)
            .map(|(d, v)| {
                let records = if v > 0 {
                    vec![RawDailyRecord::new(*d, "carol").with_traffic(v)]
                } else {
                    vec![]
                };
                DayBatch::loaded(*d, records)
            })
            .collect();

        let snap = assemble(
            &request(14, "2025-01-14", None),
            &EngineSettings::default(),
            &days,
            &BTreeMap::new(),
        )
        .unwrap();

        let carol = &snap.users["carol"];
        assert_eq!(carol.daily_traffic_bytes, traffic.to_vec());
        assert_eq!(carol.sum_prev7_traffic_bytes, 0);
        assert_eq!(carol.sum7_traffic_bytes, 130);
        assert_eq!(carol.delta_traffic_pct, DeltaPct::New);
        assert!(!carol.anomaly);
        assert_eq!(snap.meta.data_completeness, DataCompleteness::Partial);
        assert_eq!(snap.meta.missing_dates.len(), 7);
    }

    #[test]
    fn test_cumulative_matches_prefix_sums() {
        let days = flat_days("2025-01-10", 10, &[("a", 3), ("b", 4)]);
        let snap = assemble(
            &request(10, "2025-01-10", None),
            &EngineSettings::default(),
            &days,
            &BTreeMap::new(),
        )
        .unwrap();

        let mut acc = 0;
        for (i, v) in snap.global.daily_traffic_bytes.iter().enumerate() {
            acc += v;
            assert_eq!(snap.global.cumulative_traffic_bytes[i], acc);
        }
        assert_eq!(snap.global.cumulative_conns.last(), Some(&20));
        assert!(snap.meta.previous_window.is_none());
        assert_eq!(snap.global.delta_traffic_pct, DeltaPct::None);
    }

    #[test]
    fn test_user_filter_and_unknown_user() {
        let days = flat_days("2025-01-14", 14, &[("alice", 10), ("bob", 30)]);
        let settings = EngineSettings::default();

        let snap = assemble(
            &request(14, "2025-01-14", Some("bob")),
            &settings,
            &days,
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(snap.users.keys().collect::<Vec<_>>(), vec!["bob"]);
        assert_eq!(snap.global.daily_traffic_bytes, vec![30; 14]);
        assert_eq!(snap.meta.user_filter.as_deref(), Some("bob"));

        let err = assemble(
            &request(14, "2025-01-14", Some("mallory")),
            &settings,
            &days,
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert_eq!(err, InputError::UnknownUser("mallory".to_string()));
    }

    #[test]
    fn test_alias_only_user_is_zero_and_alias_attached() {
        let days = flat_days("2025-01-14", 14, &[("alice", 10)]);
        let aliases = BTreeMap::from([
            ("alice".to_string(), "Alice".to_string()),
            ("idle".to_string(), String::new()),
        ]);

        let snap = assemble(
            &request(14, "2025-01-14", None),
            &EngineSettings::default(),
            &days,
            &aliases,
        )
        .unwrap();

        assert_eq!(snap.users["alice"].alias.as_deref(), Some("Alice"));
        let idle = &snap.users["idle"];
        assert_eq!(idle.alias, None);
        assert_eq!(idle.daily_traffic_bytes, vec![0; 14]);
        assert_eq!(snap.kpi.total_users, 2);
        assert_eq!(snap.kpi.active_users, 1);
    }

    #[test]
    fn test_degraded_day_is_zero_and_reported() {
        let mut days = flat_days("2025-01-14", 14, &[("alice", 10)]);
        days[9] = DayBatch::degraded(days[9].date);

        let snap = assemble(
            &request(14, "2025-01-14", None),
            &EngineSettings::default(),
            &days,
            &BTreeMap::new(),
        )
        .unwrap();

        assert_eq!(snap.users["alice"].daily_traffic_bytes[9], 0);
        assert_eq!(snap.users["alice"].sum7_traffic_bytes, 60);
        assert_eq!(snap.users["alice"].sum_prev7_traffic_bytes, 70);
        assert_eq!(snap.meta.missing_dates, vec![days[9].date]);
    }

    #[test]
    fn test_anomaly_on_spike_over_baseline() {
        let dates = date_axis(day("2025-01-14"), 14);
        let days: Vec<DayBatch> = dates
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let v = if i < 7 { 10 } else { 100 };
                DayBatch::loaded(*d, vec![RawDailyRecord::new(*d, "spiky").with_traffic(v)])
            })
            .collect();

        let snap = assemble(
            &request(14, "2025-01-14", None),
            &EngineSettings::default(),
            &days,
            &BTreeMap::new(),
        )
        .unwrap();

        let spiky = &snap.users["spiky"];
        assert!(spiky.anomaly);
        assert_eq!(spiky.delta_traffic_pct, DeltaPct::Value { value: 900.0 });
    }

    #[test]
    fn test_domains_ranked_over_whole_window() {
        let d1 = day("2025-01-13");
        let d2 = day("2025-01-14");
        let days = vec![
            DayBatch::loaded(
                d1,
                vec![RawDailyRecord::new(d1, "a")
                    .with_domain_traffic("a.com", 300)
                    .with_domain_traffic("B.COM", 100)],
            ),
            DayBatch::loaded(d2, vec![RawDailyRecord::new(d2, "a").with_domain_traffic("a.com", 50)]),
        ];

        let snap = assemble(
            &request(2, "2025-01-14", None),
            &EngineSettings::default(),
            &days,
            &BTreeMap::new(),
        )
        .unwrap();

        let top = &snap.global.top_domains_traffic;
        assert_eq!(top[0].domain, "a.com");
        assert_eq!(top[0].value, 350);
        assert_eq!(top[0].pct, 77.78);
        assert_eq!(top[1].domain, "b.com");
        assert_eq!(snap.users["a"].top_domains_traffic, *top);
        assert!(snap.global.top_domains_conns.is_empty());
    }

    #[test]
    fn test_kpi_today_yesterday_and_avg() {
        let dates = date_axis(day("2025-01-14"), 14);
        let days: Vec<DayBatch> = dates
            .iter()
            .enumerate()
            .map(|(i, d)| {
                DayBatch::loaded(*d, vec![RawDailyRecord::new(*d, "u").with_traffic(i as u64)])
            })
            .collect();

        let snap = assemble(
            &request(14, "2025-01-14", None),
            &EngineSettings::default(),
            &days,
            &BTreeMap::new(),
        )
        .unwrap();

        assert_eq!(snap.kpi.today_traffic_bytes, 13);
        assert_eq!(snap.kpi.yesterday_traffic_bytes, 12);
        assert_eq!(snap.kpi.delta_today_traffic_pct, DeltaPct::Value { value: 8.33 });
        // days 6..=12 average to 9
        assert_eq!(snap.kpi.avg7_traffic_bytes, 9);
        assert_eq!(snap.kpi.total_traffic_bytes, (0..14).sum::<u64>());
    }

    #[test]
    fn test_huge_counters_saturate_instead_of_overflowing() {
        let big = u64::MAX / 4;
        let days = flat_days("2025-01-14", 14, &[("heavy", big)]);

        let snap = assemble(
            &request(14, "2025-01-14", None),
            &EngineSettings::default(),
            &days,
            &BTreeMap::new(),
        )
        .unwrap();

        assert_eq!(snap.kpi.today_traffic_bytes, big);
        assert_eq!(snap.kpi.total_traffic_bytes, u64::MAX);
        assert_eq!(snap.kpi.avg7_traffic_bytes, u64::MAX / 7);
        assert_eq!(snap.global.sum7_traffic_bytes, u64::MAX);
        assert_eq!(*snap.global.cumulative_traffic_bytes.last().unwrap(), u64::MAX);
        assert!(!snap.users["heavy"].anomaly);
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let days = flat_days("2025-01-14", 14, &[("x", 7), ("y", 11), ("z", 0)]);
        let req = request(14, "2025-01-14", None);
        let settings = EngineSettings::default();

        let a = assemble(&req, &settings, &days, &BTreeMap::new()).unwrap();
        let b = assemble(&req, &settings, &days, &BTreeMap::new()).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
