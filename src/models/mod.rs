pub mod record;
pub mod snapshot;

pub use record::RawDailyRecord;
pub use snapshot::{
    AllTimeStats, AllTimeUserStats, DashboardSnapshot, DataCompleteness, DateSpan, DeltaPct,
    GlobalStats, KpiSummary, RankedDomain, SnapshotMeta, UserStats,
};
