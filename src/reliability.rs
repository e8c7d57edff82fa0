//! Reliability scoring
//!
//! Turns the raw counts kept in `organization_reliability` into the two
//! percentages and the tier shown next to every farm and restaurant.
//!
//! | Tier | Commitments | Completion | On time |
//! |------|-------------|------------|---------|
//! | highly reliable | ≥ 10 | ≥ 90% | ≥ 90% |
//! | reliable | ≥ 5 | ≥ 80% | any |
//! | establishing | ≥ 1 | any | any |
//! | new | 0 | | |

use serde::Serialize;
use ts_rs::TS;

use crate::db::models::OrganizationReliability;

/// Raw reliability counts for one organization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReliabilityStats {
    pub total_commitments: u32,
    pub completed_commitments: u32,
    pub on_time_deliveries: u32,
    pub total_deliveries: u32,
    pub active_partnerships: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ReliabilityTier {
    New,
    Establishing,
    Reliable,
    HighlyReliable,
}

impl ReliabilityTier {
    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Establishing => "Establishing",
            Self::Reliable => "Reliable",
            Self::HighlyReliable => "Highly Reliable",
        }
    }
}

/// Whole percentage, rounded half away from zero; 0 with no denominator
fn percentage(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (f64::from(part) * 100.0 / f64::from(whole)).round() as u32
}

impl ReliabilityStats {
    pub fn completion_rate(&self) -> u32 {
        percentage(self.completed_commitments, self.total_commitments)
    }

    pub fn on_time_rate(&self) -> u32 {
        percentage(self.on_time_deliveries, self.total_deliveries)
    }

    pub fn tier(&self) -> ReliabilityTier {
        let total = self.total_commitments;
        let completion = self.completion_rate();

        if total >= 10 && completion >= 90 && self.on_time_rate() >= 90 {
            ReliabilityTier::HighlyReliable
        } else if total >= 5 && completion >= 80 {
            ReliabilityTier::Reliable
        } else if total >= 1 {
            ReliabilityTier::Establishing
        } else {
            ReliabilityTier::New
        }
    }
}

impl From<&OrganizationReliability> for ReliabilityStats {
    fn from(row: &OrganizationReliability) -> Self {
        let count = |n: i32| u32::try_from(n).unwrap_or(0);
        Self {
            total_commitments: count(row.total_commitments),
            completed_commitments: count(row.completed_commitments),
            on_time_deliveries: count(row.on_time_deliveries),
            total_deliveries: count(row.total_deliveries),
            active_partnerships: count(row.active_partnerships),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(total: u32, completed: u32, deliveries: u32, on_time: u32) -> ReliabilityStats {
        ReliabilityStats {
            total_commitments: total,
            completed_commitments: completed,
            on_time_deliveries: on_time,
            total_deliveries: deliveries,
            active_partnerships: 0,
        }
    }

    #[test]
    fn test_rates_round_to_whole_percent() {
        let s = stats(3, 2, 3, 1);
        assert_eq!(s.completion_rate(), 67);
        assert_eq!(s.on_time_rate(), 33);

        // 1/8 = 12.5% rounds up
        assert_eq!(stats(8, 1, 0, 0).completion_rate(), 13);
    }

    #[test]
    fn test_empty_history_is_new() {
        let s = ReliabilityStats::default();
        assert_eq!(s.completion_rate(), 0);
        assert_eq!(s.on_time_rate(), 0);
        assert_eq!(s.tier(), ReliabilityTier::New);
    }

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(stats(10, 9, 20, 18).tier(), ReliabilityTier::HighlyReliable);
        // Completion qualifies but punctuality does not
        assert_eq!(stats(10, 9, 20, 17).tier(), ReliabilityTier::Reliable);
        assert_eq!(stats(9, 9, 9, 9).tier(), ReliabilityTier::Reliable);
        assert_eq!(stats(5, 4, 0, 0).tier(), ReliabilityTier::Reliable);
        assert_eq!(stats(5, 3, 0, 0).tier(), ReliabilityTier::Establishing);
        assert_eq!(stats(1, 0, 0, 0).tier(), ReliabilityTier::Establishing);
    }

    #[test]
    fn test_labels() {
        assert_eq!(ReliabilityTier::HighlyReliable.label(), "Highly Reliable");
        assert_eq!(ReliabilityTier::New.label(), "New");
    }
}
