use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One user's usage for one calendar day, as produced by the collector.
///
/// Records are immutable once written. A day without a record for a user
/// is treated as all-zero by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDailyRecord {
    /// Timezone-naive calendar day (`YYYY-MM-DD`)
    pub date: NaiveDate,
    pub user_id: String,
    pub traffic_bytes: u64,
    pub connections: u64,
    /// Destination domain -> bytes
    #[serde(default)]
    pub domain_traffic: HashMap<String, u64>,
    /// Destination domain -> connection count
    #[serde(default)]
    pub domain_connections: HashMap<String, u64>,
}

impl RawDailyRecord {
    pub fn new(date: NaiveDate, user_id: impl Into<String>) -> Self {
        Self {
            date,
            user_id: user_id.into(),
            traffic_bytes: 0,
            connections: 0,
            domain_traffic: HashMap::new(),
            domain_connections: HashMap::new(),
        }
    }

    pub fn with_traffic(mut self, bytes: u64) -> Self {
        self.traffic_bytes = bytes;
        self
    }

    pub fn with_connections(mut self, count: u64) -> Self {
        self.connections = count;
        self
    }

    /// Add bytes for a destination domain. Does not touch `traffic_bytes`,
    /// the collector reports totals separately.
    pub fn with_domain_traffic(mut self, domain: impl Into<String>, bytes: u64) -> Self {
        let entry = self.domain_traffic.entry(domain.into()).or_insert(0);
        *entry = entry.saturating_add(bytes);
        self
    }

    pub fn with_domain_connections(mut self, domain: impl Into<String>, count: u64) -> Self {
        let entry = self.domain_connections.entry(domain.into()).or_insert(0);
        *entry = entry.saturating_add(count);
        self
    }
}
