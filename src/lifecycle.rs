//! Session lifecycle manager
//!
//! Drives sessions through `Mining → Claimed` on top of the atomic store
//! operations, keeps the user's mining snapshot in step, and settles claims
//! through the referral and balance ledgers. The rewarded-ad gate in front
//! of multiplier upgrades lives with the caller; the core trusts its
//! assertion that the gate was satisfied.

use crate::accrual::{self, Accrual};
use crate::balance::{BalanceLedger, CreditReason};
use crate::clock::Clock;
use crate::config::MiningConfig;
use crate::error::{Error, Result};
use crate::referral::ReferralLedger;
use crate::session_store::{MiningSession, SessionId, SessionStatus, SessionStore};
use crate::user_store::UserStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// A session together with its accrual figures at query time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    /// The raw session record
    pub session: MiningSession,
    /// Accrual computed against the current time
    pub accrual: Accrual,
}

/// Result of a successful claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimOutcome {
    /// The claimed session
    pub session: MiningSession,
    /// Payout before the commission split
    pub gross_earned: f64,
    /// Commission diverted to the referrer (zero without one)
    pub commission: f64,
    /// Amount credited to the session owner
    pub net_earned: f64,
    /// The referrer who received the commission, if any
    pub referrer_wallet: Option<String>,
    /// Owner's balance after the credit
    pub new_balance: f64,
}

/// Session lifecycle manager
#[derive(Clone)]
pub struct SessionLifecycle {
    sessions: SessionStore,
    users: UserStore,
    referrals: ReferralLedger,
    balances: BalanceLedger,
    clock: Arc<dyn Clock>,
    config: MiningConfig,
}

impl SessionLifecycle {
    /// Create the lifecycle manager over its collaborators
    pub fn new(
        sessions: SessionStore,
        users: UserStore,
        referrals: ReferralLedger,
        balances: BalanceLedger,
        clock: Arc<dyn Clock>,
        config: MiningConfig,
    ) -> Self {
        Self {
            sessions,
            users,
            referrals,
            balances,
            clock,
            config,
        }
    }

    /// Start a mining session for a wallet
    ///
    /// Fails with [`Error::NotFound`] for unregistered wallets,
    /// [`Error::InvalidAmount`] for a zero duration, and [`Error::Conflict`]
    /// while another session is mining for the wallet. The UI offers fixed
    /// hour choices; the core accepts any positive duration.
    pub fn start(&self, wallet_id: &str, selected_hour: u32) -> Result<MiningSession> {
        if !self.users.contains(wallet_id) {
            return Err(Error::NotFound(format!("user {}", wallet_id)));
        }
        if selected_hour == 0 {
            return Err(Error::InvalidAmount(
                "selected hour must be positive".to_string(),
            ));
        }

        let now_ms = self.clock.now_ms();
        let session = self.sessions.create_mining(wallet_id, selected_hour, now_ms)?;
        self.users
            .set_mining_snapshot(wallet_id, SessionStatus::Mining, 1, now_ms)?;

        Ok(session)
    }

    /// The wallet's most recent session with accrual computed at "now"
    ///
    /// Side-effect-free; safe to call on every polling tick.
    pub fn status(&self, wallet_id: &str) -> Result<Option<StatusReport>> {
        if !self.users.contains(wallet_id) {
            return Err(Error::NotFound(format!("user {}", wallet_id)));
        }

        let session = match self.sessions.latest_for_wallet(wallet_id) {
            Some(session) => session,
            None => return Ok(None),
        };
        let accrual = accrual::accrue(&session, self.clock.now_ms(), &self.config);

        Ok(Some(StatusReport { session, accrual }))
    }

    /// Step a session's multiplier up by one
    ///
    /// Gated externally by a rewarded-ad watch; the core only enforces the
    /// state machine and the cap.
    pub fn upgrade_multiplier(&self, session_id: SessionId) -> Result<MiningSession> {
        let now_ms = self.clock.now_ms();
        let session =
            self.sessions
                .upgrade_multiplier(session_id, self.config.max_multiplier, now_ms)?;
        self.users.set_mining_snapshot(
            &session.wallet_id,
            SessionStatus::Mining,
            session.multiplier,
            now_ms,
        )?;

        Ok(session)
    }

    /// Claim a session's payout
    ///
    /// Exactly one concurrent claim wins the `Mining → Claimed` transition;
    /// only the winner credits. If the owner redeemed a referral code, the
    /// configured commission share of the gross payout goes to the referrer
    /// and the owner nets the rest. Both credits flow through the Balance
    /// Ledger.
    pub fn claim(&self, session_id: SessionId) -> Result<ClaimOutcome> {
        let now_ms = self.clock.now_ms();
        let (session, gross) = self
            .sessions
            .transition_to_claimed(session_id, now_ms, &self.config)?;

        let referrer_wallet = self.referrals.commission_for(&session.wallet_id);
        let commission = match &referrer_wallet {
            Some(referrer) => {
                let commission = gross * self.config.commission_rate;
                self.balances.credit(
                    referrer,
                    commission,
                    CreditReason::ReferralCommission,
                    now_ms,
                )?;
                info!(
                    "Commission {:.2} from {} to referrer {}",
                    commission, session.wallet_id, referrer
                );
                commission
            }
            None => 0.0,
        };

        let net = gross - commission;
        let credit = self
            .balances
            .credit(&session.wallet_id, net, CreditReason::ClaimPayout, now_ms)?;
        self.users
            .set_mining_snapshot(&session.wallet_id, SessionStatus::Idle, 1, now_ms)?;

        Ok(ClaimOutcome {
            session,
            gross_earned: gross,
            commission,
            net_earned: net,
            referrer_wallet,
            new_balance: credit.new_balance,
        })
    }

    /// The session store this manager drives
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The configuration this manager runs under
    pub fn config(&self) -> &MiningConfig {
        &self.config
    }
}
