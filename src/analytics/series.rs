//! Calendar alignment of sparse daily records
//!
//! Every series produced here shares one date axis, so index `i` of any
//! user's series and of the global series always refers to `dates[i]`.

use chrono::{Days, NaiveDate};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::models::RawDailyRecord;

/// Ascending calendar days `[to - len + 1 ..= to]`
pub fn date_axis(to: NaiveDate, len: usize) -> Vec<NaiveDate> {
    (0..len as u64)
        .rev()
        .filter_map(|back| to.checked_sub_days(Days::new(back)))
        .collect()
}

/// Daily traffic and connection counts on a shared axis
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSeries {
    pub daily_traffic_bytes: Vec<u64>,
    pub daily_connections: Vec<u64>,
}

impl UserSeries {
    pub fn zeroed(len: usize) -> Self {
        Self {
            daily_traffic_bytes: vec![0; len],
            daily_connections: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.daily_traffic_bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.daily_traffic_bytes.is_empty()
    }

    pub fn cumulative_traffic_bytes(&self) -> Vec<u64> {
        prefix_sums(&self.daily_traffic_bytes)
    }

    pub fn cumulative_connections(&self) -> Vec<u64> {
        prefix_sums(&self.daily_connections)
    }

    fn add_assign(&mut self, other: &UserSeries) {
        assert_eq!(self.len(), other.len(), "series lengths differ");
        for (acc, v) in self
            .daily_traffic_bytes
            .iter_mut()
            .zip(&other.daily_traffic_bytes)
        {
            *acc = acc.saturating_add(*v);
        }
        for (acc, v) in self
            .daily_connections
            .iter_mut()
            .zip(&other.daily_connections)
        {
            *acc = acc.saturating_add(*v);
        }
    }
}

pub fn prefix_sums(values: &[u64]) -> Vec<u64> {
    values
        .iter()
        .scan(0u64, |acc, v| {
            *acc = acc.saturating_add(*v);
            Some(*acc)
        })
        .collect()
}

/// Records placed onto the date axis, one slot per (user, day).
///
/// A duplicate record for the same (user, day) replaces the earlier one
/// (last write wins); duplicates are never summed.
#[derive(Debug)]
pub struct AlignedDays<'a> {
    dates: Vec<NaiveDate>,
    cells: BTreeMap<String, Vec<Option<&'a RawDailyRecord>>>,
}

impl<'a> AlignedDays<'a> {
    /// Align `records` onto `dates` for exactly the given users.
    ///
    /// Records for users outside `users` or for days outside the axis are
    /// ignored.
    pub fn align(
        dates: Vec<NaiveDate>,
        users: &BTreeSet<String>,
        records: impl IntoIterator<Item = &'a RawDailyRecord>,
    ) -> Self {
        let index: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut cells: BTreeMap<String, Vec<Option<&'a RawDailyRecord>>> = users
            .iter()
            .map(|u| (u.clone(), vec![None; dates.len()]))
            .collect();

        for record in records {
            let Some(&i) = index.get(&record.date) else {
                debug!("Ignoring record for {} outside the window", record.date);
                continue;
            };
            let Some(slots) = cells.get_mut(&record.user_id) else {
                continue;
            };
            if slots[i].replace(record).is_some() {
                warn!(
                    "Duplicate record for user '{}' on {}, keeping the last one",
                    record.user_id, record.date
                );
            }
        }

        Self { dates, cells }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    /// Records of one user, absent days skipped
    pub fn records_for(&self, user: &str) -> impl Iterator<Item = &'a RawDailyRecord> + Clone + '_ {
        self.cells
            .get(user)
            .into_iter()
            .flat_map(|slots| slots.iter().flatten().copied())
    }

    /// Records of every user, absent days skipped
    pub fn all_records(&self) -> impl Iterator<Item = &'a RawDailyRecord> + Clone + '_ {
        self.cells
            .values()
            .flat_map(|slots| slots.iter().flatten().copied())
    }

    /// Zero-filled series for one user. Unknown users get an all-zero series.
    pub fn series_for(&self, user: &str) -> UserSeries {
        let mut series = UserSeries::zeroed(self.dates.len());
        if let Some(slots) = self.cells.get(user) {
            for (i, slot) in slots.iter().enumerate() {
                if let Some(record) = slot {
                    series.daily_traffic_bytes[i] = record.traffic_bytes;
                    series.daily_connections[i] = record.connections;
                }
            }
        }
        series
    }

    /// Series for every aligned user
    pub fn user_series(&self) -> BTreeMap<String, UserSeries> {
        self.cells
            .keys()
            .map(|user| (user.clone(), self.series_for(user)))
            .collect()
    }

    /// Index-wise sum over the given per-user series
    pub fn global_series<'s>(&self, users: impl IntoIterator<Item = &'s UserSeries>) -> UserSeries {
        let mut global = UserSeries::zeroed(self.dates.len());
        for series in users {
            global.add_assign(series);
        }
        global
    }
}
