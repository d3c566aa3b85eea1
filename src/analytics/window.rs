//! Rolling 7-day window sums and deltas

use crate::models::DeltaPct;

/// Length of the current and of the previous sub-window
pub const SUB_WINDOW_DAYS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub sum_current_7d: u64,
    pub sum_previous_7d: u64,
    pub delta_pct: DeltaPct,
}

impl WindowStats {
    /// Sum of the last 7 entries and of the 7 entries before them.
    ///
    /// With fewer than 14 entries the previous window does not exist:
    /// `sum_previous_7d` is 0 and the delta is [`DeltaPct::None`].
    /// With fewer than 7 entries the current window is whatever is there.
    pub fn compute(series: &[u64]) -> Self {
        let len = series.len();
        let current_start = len.saturating_sub(SUB_WINDOW_DAYS);
        let sum_current_7d = sum(&series[current_start..]);

        if len < 2 * SUB_WINDOW_DAYS {
            return Self {
                sum_current_7d,
                sum_previous_7d: 0,
                delta_pct: DeltaPct::None,
            };
        }

        let sum_previous_7d = sum(&series[current_start - SUB_WINDOW_DAYS..current_start]);
        Self {
            sum_current_7d,
            sum_previous_7d,
            delta_pct: delta_pct(sum_current_7d, sum_previous_7d),
        }
    }
}

/// `(current - previous) / previous * 100`, rounded to 2 decimals.
///
/// A zero baseline never divides: it yields [`DeltaPct::New`] when there
/// is current activity and [`DeltaPct::None`] otherwise.
pub fn delta_pct(current: u64, previous: u64) -> DeltaPct {
    match (previous, current) {
        (0, 0) => DeltaPct::None,
        (0, _) => DeltaPct::New,
        (prev, cur) => {
            let raw = (cur as f64 - prev as f64) * 100.0 / prev as f64;
            DeltaPct::Value {
                value: (raw * 100.0).round() / 100.0,
            }
        }
    }
}

fn sum(values: &[u64]) -> u64 {
    values.iter().fold(0u64, |acc, v| acc.saturating_add(*v))
}
