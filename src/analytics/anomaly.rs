//! Per-user traffic spike detection
//!
//! The rule only looks at the user's own two 7-day windows:
//! - with a baseline, flag when `current > previous * multiplier`
//! - without one, flag when `current > new_user_floor_bytes`

use serde::{Deserialize, Serialize};

pub const DEFAULT_MULTIPLIER: f64 = 3.0;
pub const DEFAULT_NEW_USER_FLOOR_BYTES: u64 = 1 << 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRule {
    pub multiplier: f64,
    pub new_user_floor_bytes: u64,
}

impl Default for AnomalyRule {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_MULTIPLIER,
            new_user_floor_bytes: DEFAULT_NEW_USER_FLOOR_BYTES,
        }
    }
}

impl AnomalyRule {
    pub fn is_anomalous(&self, current_7d: u64, previous_7d: u64) -> bool {
        if previous_7d == 0 {
            return current_7d > self.new_user_floor_bytes;
        }
        // Integral multipliers compare exactly; f64 loses precision above 2^53
        if self.multiplier.fract() == 0.0 && (0.0..=u64::MAX as f64).contains(&self.multiplier) {
            let threshold = u128::from(previous_7d) * self.multiplier as u128;
            return u128::from(current_7d) > threshold;
        }
        current_7d as f64 > previous_7d as f64 * self.multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1 << 30;

    #[test]
    fn test_spike_over_multiplier() {
        let rule = AnomalyRule::default();
        assert!(rule.is_anomalous(301, 100));
        assert!(!rule.is_anomalous(300, 100));
        assert!(!rule.is_anomalous(50, 100));
    }

    #[test]
    fn test_integral_multiplier_is_exact_for_large_totals() {
        let rule = AnomalyRule::default();
        let prev = (1u64 << 53) + 1;
        assert!(!rule.is_anomalous(prev * 3, prev));
        assert!(rule.is_anomalous(prev * 3 + 1, prev));
        assert!(!rule.is_anomalous(u64::MAX, u64::MAX / 3 + 1));
    }

    #[test]
    fn test_new_user_floor() {
        let rule = AnomalyRule::default();
        assert!(!rule.is_anomalous(GIB, 0));
        assert!(rule.is_anomalous(GIB + 1, 0));
        assert!(!rule.is_anomalous(0, 0));
    }

    #[test]
    fn test_custom_rule() {
        let rule = AnomalyRule {
            multiplier: 1.5,
            new_user_floor_bytes: 10,
        };
        assert!(rule.is_anomalous(151, 100));
        assert!(rule.is_anomalous(11, 0));
    }

    #[test]
    fn test_is_pure() {
        let rule = AnomalyRule::default();
        for (cur, prev) in [(0, 0), (10, 1), (3 * GIB, 0), (7, 7)] {
            assert_eq!(rule.is_anomalous(cur, prev), rule.is_anomalous(cur, prev));
        }
    }
}
