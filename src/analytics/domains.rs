//! Top-N destination rankings
//!
//! Domain keys are normalized (trimmed, lowercased) before merging so the
//! same destination reported with different casing across days counts once.

use std::collections::HashMap;

use crate::models::RankedDomain;

pub const DEFAULT_TOP_N: usize = 5;

pub fn normalize_domain(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Per-domain totals merged across any number of daily maps
#[derive(Debug, Clone, Default)]
pub struct DomainTotals {
    totals: HashMap<String, u64>,
}

impl DomainTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_maps<'a>(maps: impl IntoIterator<Item = &'a HashMap<String, u64>>) -> Self {
        let mut totals = Self::new();
        for map in maps {
            totals.merge(map);
        }
        totals
    }

    pub fn merge(&mut self, map: &HashMap<String, u64>) {
        for (domain, value) in map {
            self.add(domain, *value);
        }
    }

    pub fn add(&mut self, domain: &str, value: u64) {
        let Some(key) = normalize_domain(domain) else {
            return;
        };
        let entry = self.totals.entry(key).or_insert(0);
        *entry = entry.saturating_add(value);
    }

    /// Sum over every domain, not just the ranked ones
    pub fn total(&self) -> u64 {
        self.totals.values().fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Descending by value, ties broken by domain name; zero values dropped
    pub fn rank(&self, top_n: usize) -> Vec<RankedDomain> {
        let total = self.total();

        let mut entries: Vec<(&String, u64)> = self
            .totals
            .iter()
            .filter(|(_, v)| **v > 0)
            .map(|(k, v)| (k, *v))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        entries
            .into_iter()
            .take(top_n)
            .map(|(domain, value)| RankedDomain {
                domain: domain.clone(),
                value,
                pct: share_pct(value, total),
            })
            .collect()
    }
}

fn share_pct(value: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = value as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Merge `maps` and rank the top `top_n` domains
pub fn rank_domains<'a>(
    maps: impl IntoIterator<Item = &'a HashMap<String, u64>>,
    top_n: usize,
) -> Vec<RankedDomain> {
    DomainTotals::from_maps(maps).rank(top_n)
}
