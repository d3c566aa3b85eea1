//! Lifetime totals per user over every day the store holds

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::analytics::domains::DomainTotals;
use crate::analytics::snapshot::{load_days, DayBatch};
use crate::error::{EngineError, EngineResult};
use crate::models::{AllTimeStats, AllTimeUserStats};
use crate::storage::{RecordStore, StoreError};

pub const ALL_TIME_TOP_DOMAINS: usize = 3;

pub async fn all_time_stats(store: &Arc<dyn RecordStore>) -> EngineResult<AllTimeStats> {
    store
        .ping()
        .await
        .map_err(|e| EngineError::UpstreamUnavailable(e.to_string()))?;

    let dates = store.list_dates().await.map_err(|e| match e {
        StoreError::Unavailable(reason) => EngineError::UpstreamUnavailable(reason),
        other => EngineError::Other(other.into()),
    })?;
    let days = load_days(store, &dates).await?;
    let aliases = store.aliases().await.unwrap_or_else(|e| {
        tracing::warn!("Failed to load user aliases: {}", e);
        BTreeMap::new()
    });

    Ok(summarize(&days, &aliases))
}

/// Sorted by traffic descending, then user id
pub fn summarize(days: &[DayBatch], aliases: &BTreeMap<String, String>) -> AllTimeStats {
    #[derive(Default)]
    struct Acc {
        traffic: u64,
        conns: u64,
        days: BTreeSet<chrono::NaiveDate>,
        domains: DomainTotals,
    }

    let mut per_user: BTreeMap<&str, Acc> = aliases
        .keys()
        .map(|u| (u.as_str(), Acc::default()))
        .collect();

    for record in days.iter().flat_map(|d| d.records.iter()) {
        let acc = per_user.entry(record.user_id.as_str()).or_default();
        acc.traffic = acc.traffic.saturating_add(record.traffic_bytes);
        acc.conns = acc.conns.saturating_add(record.connections);
        acc.days.insert(record.date);
        acc.domains.merge(&record.domain_traffic);
    }

    let mut users: Vec<AllTimeUserStats> = per_user
        .into_iter()
        .map(|(user, acc)| AllTimeUserStats {
            user_id: user.to_string(),
            alias: aliases.get(user).filter(|a| !a.trim().is_empty()).cloned(),
            traffic_bytes: acc.traffic,
            conns: acc.conns,
            days: acc.days.len(),
            top_domains_traffic: acc.domains.rank(ALL_TIME_TOP_DOMAINS),
        })
        .collect();
    users.sort_by_key(|u| (Reverse(u.traffic_bytes), u.user_id.clone()));

    AllTimeStats { users }
}
