//! Usage analytics aggregation engine
//!
//! Turns daily per-user usage records into a [`DashboardSnapshot`]:
//! aligned daily series, 7-day window sums and deltas, top-domain rankings
//! and per-user anomaly flags.
//!
//! [`DashboardSnapshot`]: crate::models::DashboardSnapshot

pub mod alltime;
pub mod anomaly;
pub mod cache;
pub mod dates;
pub mod domains;
pub mod series;
pub mod snapshot;
pub mod window;

pub use alltime::all_time_stats;
pub use anomaly::AnomalyRule;
pub use cache::SnapshotCache;
pub use dates::available_dates;
pub use domains::{normalize_domain, rank_domains, DomainTotals};
pub use series::{date_axis, AlignedDays, UserSeries};
pub use snapshot::{assemble, DayBatch, EngineSettings, SnapshotEngine, SnapshotRequest};
pub use window::{delta_pct, WindowStats};
