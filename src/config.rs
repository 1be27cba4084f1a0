//! Mining economy configuration
//!
//! All tunables live here so the accrual and payout behavior is a named,
//! testable choice instead of a side effect of whichever code path runs.

use serde::{Deserialize, Serialize};

/// How a claim converts a session into a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutPolicy {
    /// Pay for elapsed time, capped at the planned duration.
    ElapsedCapped,
    /// Pay as though the full planned duration elapsed, even on early claim.
    PlannedDuration,
}

/// How earnings are computed across multiplier upgrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccrualMode {
    /// Recompute the whole elapsed window at the current multiplier.
    ///
    /// Time that elapsed under a lower multiplier is revalued upward on
    /// upgrade. Earnings are still monotone and capped at the planned window.
    CurrentMultiplier,
    /// Sum per-segment earnings at the multiplier each segment ran under.
    Segmented,
}

/// Tunables for the mining economy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Tokens earned per effective second at multiplier 1.
    pub base_rate: f64,
    /// Maximum session multiplier reachable through upgrades.
    pub max_multiplier: u32,
    /// One-time bonus credited to a referrer when their code is redeemed.
    pub referral_bonus: f64,
    /// Fraction of a claim payout diverted to the claimer's referrer.
    pub commission_rate: f64,
    /// Smallest ad-watch reward, inclusive.
    pub ad_reward_min: u32,
    /// Largest ad-watch reward, inclusive.
    pub ad_reward_max: u32,
    /// Auth token lifetime in milliseconds.
    pub auth_token_ttl_ms: u64,
    /// Claim payout policy.
    pub payout_policy: PayoutPolicy,
    /// Accrual computation mode.
    pub accrual_mode: AccrualMode,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            base_rate: 0.01,
            max_multiplier: 6,
            referral_bonus: 200.0,
            commission_rate: 0.10,
            ad_reward_min: 5,
            ad_reward_max: 50,
            auth_token_ttl_ms: 7 * 24 * 3600 * 1000,
            payout_policy: PayoutPolicy::ElapsedCapped,
            accrual_mode: AccrualMode::CurrentMultiplier,
        }
    }
}
