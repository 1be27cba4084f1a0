//! Session accrual engine
//!
//! Pure functions from a session record and "now" to elapsed, remaining, and
//! earned figures. No side effects, no cached state, no failure modes:
//! missing start times fall back to the creation time and negative elapsed
//! time clamps to zero, so callers can run this on every polling tick.
//!
//! For a fixed multiplier the earned figure is monotonically non-decreasing
//! in `now`, and it never exceeds the planned window's worth of earnings.

use crate::config::{AccrualMode, MiningConfig, PayoutPolicy};
use crate::session_store::MiningSession;
use serde::{Deserialize, Serialize};

/// Computed accrual figures for a session at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accrual {
    /// Whole seconds since the session started, clamped at zero
    pub elapsed_seconds: u64,
    /// Elapsed seconds capped at the planned duration
    pub effective_seconds: u64,
    /// Seconds until the planned duration ends, clamped at zero
    pub remaining_seconds: u64,
    /// Tokens earned so far
    pub earned_so_far: f64,
    /// Whether the planned duration has fully elapsed
    pub is_complete: bool,
}

/// Compute the accrual snapshot for a session at `now_ms`.
pub fn accrue(session: &MiningSession, now_ms: u64, config: &MiningConfig) -> Accrual {
    let start_ms = session.start_time_ms();
    let planned_seconds = session.planned_seconds();

    let elapsed_seconds = now_ms.saturating_sub(start_ms) / 1000;
    let effective_seconds = elapsed_seconds.min(planned_seconds);
    let remaining_seconds = planned_seconds.saturating_sub(elapsed_seconds);

    let earned_so_far = match config.accrual_mode {
        AccrualMode::CurrentMultiplier => {
            effective_seconds as f64 * config.base_rate * f64::from(session.multiplier.max(1))
        }
        AccrualMode::Segmented => earned_over_segments(session, effective_seconds, config),
    };

    Accrual {
        elapsed_seconds,
        effective_seconds,
        remaining_seconds,
        earned_so_far,
        is_complete: remaining_seconds == 0,
    }
}

/// Payout for claiming the session at `now_ms`, per the configured policy.
///
/// `ElapsedCapped` pays for the time that actually elapsed (capped at the
/// plan); `PlannedDuration` pays as though the full planned window elapsed,
/// regardless of when the claim lands.
pub fn claim_amount(session: &MiningSession, now_ms: u64, config: &MiningConfig) -> f64 {
    let at_ms = match config.payout_policy {
        PayoutPolicy::ElapsedCapped => now_ms,
        PayoutPolicy::PlannedDuration => {
            session.start_time_ms() + session.planned_seconds() * 1000
        }
    };
    accrue(session, at_ms, config).earned_so_far
}

/// Earnings for the session's full planned window at its current multiplier.
///
/// This is the headline figure a completion notification reports.
pub fn planned_amount(session: &MiningSession, config: &MiningConfig) -> f64 {
    session.planned_seconds() as f64 * config.base_rate * f64::from(session.multiplier.max(1))
}

/// Sum earnings per multiplier segment over the first `effective_seconds`
/// of the session. A session without segment history is valued at its
/// current multiplier for the whole window.
fn earned_over_segments(
    session: &MiningSession,
    effective_seconds: u64,
    config: &MiningConfig,
) -> f64 {
    if session.segments.is_empty() {
        return effective_seconds as f64 * config.base_rate * f64::from(session.multiplier.max(1));
    }

    let start_ms = session.start_time_ms();
    let mut earned = 0.0;

    for (i, segment) in session.segments.iter().enumerate() {
        let from = (segment.started_at_ms.saturating_sub(start_ms) / 1000).min(effective_seconds);
        let to = match session.segments.get(i + 1) {
            Some(next) => {
                (next.started_at_ms.saturating_sub(start_ms) / 1000).min(effective_seconds)
            }
            None => effective_seconds,
        };
        let duration = to.saturating_sub(from);
        earned += duration as f64 * config.base_rate * f64::from(segment.multiplier.max(1));
    }

    earned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_store::{MiningSession, MultiplierSegment, SessionId};

    fn session(selected_hour: u32, multiplier: u32, start_ms: u64) -> MiningSession {
        let mut s = MiningSession::new(SessionId::new(1), "wallet-a".to_string(), selected_hour, start_ms);
        s.multiplier = multiplier;
        s
    }

    #[test]
    fn test_one_hour_at_double_multiplier_earns_72() {
        let s = session(1, 2, 0);
        let config = MiningConfig::default();
        let accrual = accrue(&s, 3600 * 1000, &config);
        assert_eq!(accrual.effective_seconds, 3600);
        assert_eq!(accrual.earned_so_far, 72.0);
        assert!(accrual.is_complete);
    }

    #[test]
    fn test_earnings_capped_at_planned_window() {
        let s = session(1, 3, 0);
        let config = MiningConfig::default();
        // Poll two hours late: earnings stop at the one-hour plan.
        let accrual = accrue(&s, 3 * 3600 * 1000, &config);
        assert_eq!(accrual.elapsed_seconds, 3 * 3600);
        assert_eq!(accrual.effective_seconds, 3600);
        assert_eq!(accrual.remaining_seconds, 0);
        assert_eq!(accrual.earned_so_far, 3600.0 * 0.01 * 3.0);
    }

    #[test]
    fn test_earnings_never_exceed_planned_cap() {
        let config = MiningConfig::default();
        for hour in [1u32, 2, 4, 12, 18, 24] {
            let s = session(hour, 6, 0);
            let cap = f64::from(hour) * 3600.0 * config.base_rate * 6.0;
            for now_s in [0u64, 1, 1800, 7200, 200_000] {
                let accrual = accrue(&s, now_s * 1000, &config);
                assert!(accrual.earned_so_far <= cap + 1e-9);
            }
        }
    }

    #[test]
    fn test_accrual_is_monotone_in_now() {
        let s = session(2, 4, 10_000);
        let config = MiningConfig::default();
        let mut previous = -1.0;
        for now_s in (0..9000).step_by(37) {
            let accrual = accrue(&s, 10_000 + now_s * 1000, &config);
            assert!(accrual.earned_so_far >= previous);
            previous = accrual.earned_so_far;
        }
    }

    #[test]
    fn test_clock_before_start_clamps_to_zero() {
        let s = session(1, 2, 1_000_000);
        let config = MiningConfig::default();
        let accrual = accrue(&s, 500_000, &config);
        assert_eq!(accrual.elapsed_seconds, 0);
        assert_eq!(accrual.earned_so_far, 0.0);
        assert_eq!(accrual.remaining_seconds, 3600);
        assert!(!accrual.is_complete);
    }

    #[test]
    fn test_missing_start_time_falls_back_to_created_date() {
        let mut s = session(1, 1, 60_000);
        s.mining_start_time_ms = None;
        let config = MiningConfig::default();
        let accrual = accrue(&s, 60_000 + 100_000, &config);
        assert_eq!(accrual.elapsed_seconds, 100);
    }

    #[test]
    fn test_is_complete_iff_no_remaining_seconds() {
        let s = session(1, 1, 0);
        let config = MiningConfig::default();

        let before = accrue(&s, 3_599_000, &config);
        assert_eq!(before.remaining_seconds, 1);
        assert!(!before.is_complete);

        let at = accrue(&s, 3_600_000, &config);
        assert_eq!(at.remaining_seconds, 0);
        assert!(at.is_complete);
    }

    #[test]
    fn test_current_multiplier_revalues_whole_window() {
        // One hour plan, upgraded to x2 at the 30 minute mark: the whole
        // elapsed window is revalued at the current multiplier.
        let mut s = session(1, 2, 0);
        s.segments = vec![
            MultiplierSegment { multiplier: 1, started_at_ms: 0 },
            MultiplierSegment { multiplier: 2, started_at_ms: 1800 * 1000 },
        ];
        let config = MiningConfig::default();
        let accrual = accrue(&s, 3600 * 1000, &config);
        assert_eq!(accrual.earned_so_far, 72.0);
    }

    #[test]
    fn test_segmented_values_each_stretch_at_its_multiplier() {
        let mut s = session(1, 2, 0);
        s.segments = vec![
            MultiplierSegment { multiplier: 1, started_at_ms: 0 },
            MultiplierSegment { multiplier: 2, started_at_ms: 1800 * 1000 },
        ];
        let config = MiningConfig {
            accrual_mode: AccrualMode::Segmented,
            ..MiningConfig::default()
        };
        let accrual = accrue(&s, 3600 * 1000, &config);
        // 1800s at x1 + 1800s at x2 = 18 + 36
        assert_eq!(accrual.earned_so_far, 54.0);
    }

    #[test]
    fn test_segmented_never_exceeds_current_multiplier_mode() {
        let mut s = session(2, 5, 0);
        s.segments = vec![
            MultiplierSegment { multiplier: 1, started_at_ms: 0 },
            MultiplierSegment { multiplier: 3, started_at_ms: 600 * 1000 },
            MultiplierSegment { multiplier: 5, started_at_ms: 4000 * 1000 },
        ];
        let current = MiningConfig::default();
        let segmented = MiningConfig {
            accrual_mode: AccrualMode::Segmented,
            ..MiningConfig::default()
        };
        for now_s in [0u64, 300, 700, 4100, 7200, 10_000] {
            let a = accrue(&s, now_s * 1000, &segmented).earned_so_far;
            let b = accrue(&s, now_s * 1000, &current).earned_so_far;
            assert!(a <= b + 1e-9);
        }
    }

    #[test]
    fn test_segmented_caps_segments_at_planned_window() {
        // Upgrade lands after the planned window already ended: the new
        // segment contributes nothing.
        let mut s = session(1, 4, 0);
        s.segments = vec![
            MultiplierSegment { multiplier: 1, started_at_ms: 0 },
            MultiplierSegment { multiplier: 4, started_at_ms: 5000 * 1000 },
        ];
        let config = MiningConfig {
            accrual_mode: AccrualMode::Segmented,
            ..MiningConfig::default()
        };
        let accrual = accrue(&s, 6000 * 1000, &config);
        assert_eq!(accrual.earned_so_far, 36.0);
    }

    #[test]
    fn test_elapsed_capped_policy_pays_for_elapsed_time() {
        let s = session(1, 2, 0);
        let config = MiningConfig::default();
        // Claim half way through the hour.
        let paid = claim_amount(&s, 1800 * 1000, &config);
        assert_eq!(paid, 36.0);
    }

    #[test]
    fn test_planned_duration_policy_pays_full_window_on_early_claim() {
        let s = session(1, 2, 0);
        let config = MiningConfig {
            payout_policy: PayoutPolicy::PlannedDuration,
            ..MiningConfig::default()
        };
        let paid = claim_amount(&s, 1800 * 1000, &config);
        assert_eq!(paid, 72.0);
    }

    #[test]
    fn test_policies_agree_once_window_has_elapsed() {
        let s = session(1, 3, 0);
        let elapsed = MiningConfig::default();
        let planned = MiningConfig {
            payout_policy: PayoutPolicy::PlannedDuration,
            ..MiningConfig::default()
        };
        let now_ms = 2 * 3600 * 1000;
        assert_eq!(
            claim_amount(&s, now_ms, &elapsed),
            claim_amount(&s, now_ms, &planned)
        );
    }

    #[test]
    fn test_planned_amount_matches_full_window() {
        let s = session(4, 3, 0);
        let config = MiningConfig::default();
        assert_eq!(planned_amount(&s, &config), 4.0 * 3600.0 * 0.01 * 3.0);
    }
}
