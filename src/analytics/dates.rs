//! Dates a caller can pick as the end of a window

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::analytics::series::date_axis;
use crate::error::{EngineError, EngineResult};
use crate::storage::{RecordStore, StoreError};

/// The most recent days are always offered, even before the collector ran
pub const RECENT_DAYS: usize = 14;

/// Stored dates plus the last [`RECENT_DAYS`] days up to `today`, newest first
pub async fn available_dates(
    store: &Arc<dyn RecordStore>,
    today: NaiveDate,
) -> EngineResult<Vec<NaiveDate>> {
    let stored = match store.list_dates().await {
        Ok(dates) => dates,
        Err(StoreError::Unavailable(reason)) => {
            return Err(EngineError::UpstreamUnavailable(reason))
        }
        Err(e) => {
            tracing::warn!("Failed to list stored dates: {}", e);
            Vec::new()
        }
    };

    Ok(merge_recent(stored, today))
}

pub fn merge_recent(stored: Vec<NaiveDate>, today: NaiveDate) -> Vec<NaiveDate> {
    let mut dates: BTreeSet<NaiveDate> = stored.into_iter().collect();
    dates.extend(date_axis(today, RECENT_DAYS));
    dates.into_iter().rev().collect()
}
