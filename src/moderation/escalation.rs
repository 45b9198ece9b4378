//! Escalation policy
//!
//! Maps a cumulative active-warning count to an automatic timeout
//! duration. The policy is an ordered tier table: counts below the first
//! tier take no action, counts past the last tier saturate at it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::moderation::{ModerationError, ModerationResult};

/// One escalation step: at `min_warnings` active warnings, time out for
/// `duration_minutes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationTier {
    pub min_warnings: u64,
    pub duration_minutes: u64,
}

/// The canonical ladder: 3→10m, 4→30m, 5→1h, 6→6h, 7→12h, 8→24h
#[must_use]
pub fn default_tiers() -> Vec<EscalationTier> {
    [
        (3, 10),
        (4, 30),
        (5, 60),
        (6, 360),
        (7, 720),
        (8, 1440),
    ]
    .into_iter()
    .map(|(min_warnings, duration_minutes)| EscalationTier {
        min_warnings,
        duration_minutes,
    })
    .collect()
}

/// Deterministic count → duration table
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    /// Sorted ascending by `min_warnings`, thresholds unique
    tiers: Vec<EscalationTier>,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
        }
    }
}

impl EscalationPolicy {
    /// Build a policy from configured tiers
    ///
    /// # Errors
    /// `Validation` when two tiers share a threshold or a tier has a zero
    /// duration. An empty table is legal and never escalates.
    pub fn new(mut tiers: Vec<EscalationTier>) -> ModerationResult<Self> {
        tiers.sort_by_key(|t| t.min_warnings);
        for pair in tiers.windows(2) {
            if pair[0].min_warnings == pair[1].min_warnings {
                return Err(ModerationError::Validation(format!(
                    "duplicate escalation threshold {}",
                    pair[0].min_warnings
                )));
            }
        }
        if let Some(bad) = tiers.iter().find(|t| t.duration_minutes == 0) {
            return Err(ModerationError::Validation(format!(
                "escalation tier at {} warnings has zero duration",
                bad.min_warnings
            )));
        }
        Ok(Self { tiers })
    }

    /// Timeout duration for a given active-warning count, if any
    ///
    /// Total over all counts: `None` below the lowest tier, the matching
    /// tier in range, and the top tier for everything beyond it.
    #[must_use]
    pub fn duration_for(&self, active_count: u64) -> Option<Duration> {
        self.tiers
            .iter()
            .rev()
            .find(|t| active_count >= t.min_warnings)
            .map(|t| Duration::from_secs(t.duration_minutes * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    #[test]
    fn test_no_action_below_first_tier() {
        let policy = EscalationPolicy::default();
        assert_eq!(policy.duration_for(0), None);
        assert_eq!(policy.duration_for(1), None);
        assert_eq!(policy.duration_for(2), None);
    }

    #[test]
    fn test_canonical_table() {
        let policy = EscalationPolicy::default();
        assert_eq!(policy.duration_for(3), Some(minutes(10)));
        assert_eq!(policy.duration_for(4), Some(minutes(30)));
        assert_eq!(policy.duration_for(5), Some(minutes(60)));
        assert_eq!(policy.duration_for(6), Some(minutes(360)));
        assert_eq!(policy.duration_for(7), Some(minutes(720)));
        assert_eq!(policy.duration_for(8), Some(minutes(1440)));
    }

    #[test]
    fn test_strictly_increasing_within_table() {
        let policy = EscalationPolicy::default();
        for count in 3..8 {
            assert!(policy.duration_for(count) < policy.duration_for(count + 1));
        }
    }

    #[test]
    fn test_saturates_at_top_tier() {
        let policy = EscalationPolicy::default();
        let top = policy.duration_for(8);
        for count in [9, 20, 1_000, u64::MAX] {
            assert_eq!(policy.duration_for(count), top);
        }
    }

    #[test]
    fn test_empty_table_never_escalates() {
        let policy = EscalationPolicy::new(Vec::new()).unwrap();
        assert_eq!(policy.duration_for(u64::MAX), None);
    }

    #[test]
    fn test_unsorted_config_is_normalized() {
        let policy = EscalationPolicy::new(vec![
            EscalationTier {
                min_warnings: 5,
                duration_minutes: 60,
            },
            EscalationTier {
                min_warnings: 2,
                duration_minutes: 5,
            },
        ])
        .unwrap();
        assert_eq!(policy.duration_for(2), Some(minutes(5)));
        assert_eq!(policy.duration_for(4), Some(minutes(5)));
        assert_eq!(policy.duration_for(9), Some(minutes(60)));
    }

    #[test]
    fn test_duplicate_threshold_rejected() {
        let result = EscalationPolicy::new(vec![
            EscalationTier {
                min_warnings: 3,
                duration_minutes: 10,
            },
            EscalationTier {
                min_warnings: 3,
                duration_minutes: 30,
            },
        ]);
        assert!(matches!(result, Err(ModerationError::Validation(_))));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let result = EscalationPolicy::new(vec![EscalationTier {
            min_warnings: 3,
            duration_minutes: 0,
        }]);
        assert!(matches!(result, Err(ModerationError::Validation(_))));
    }
}
