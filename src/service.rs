//! Service facade
//!
//! The operation surface the UI and notification layers call: registration
//! and login, the mining lifecycle, referrals, ad rewards, and the
//! leaderboard. Every protected operation resolves its bearer token first,
//! and session mutations check that the session belongs to the caller.

use crate::ad_reward::{AdRewardLog, AdRewardOutcome};
use crate::auth::AuthTokens;
use crate::balance::BalanceLedger;
use crate::clock::{Clock, SystemClock};
use crate::config::MiningConfig;
use crate::db::ParityDatabase;
use crate::error::{Error, Result};
use crate::lifecycle::{ClaimOutcome, SessionLifecycle, StatusReport};
use crate::referral::{ReferralLedger, ReferralRecord};
use crate::session_store::{MiningSession, SessionId, SessionStatus, SessionStore};
use crate::user_store::{LeaderboardEntry, UserRecord, UserStore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A logged-in user: the record plus its bearer token
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// The user record
    pub user: UserRecord,
    /// Bearer token for subsequent calls
    pub token: String,
}

/// Snapshot returned by `get_user`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Wallet identifier
    pub wallet_id: String,
    /// Cumulative token balance
    pub total_token: f64,
    /// Lifetime earnings
    pub total_tokens_earned: f64,
    /// Latest session's multiplier
    pub multiplier: u32,
    /// Latest session's status
    pub mining_status: SessionStatus,
    /// Registration timestamp (Unix milliseconds)
    pub created_at_ms: u64,
}

/// Confirmation returned when a referral code is redeemed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralConfirmation {
    /// The referrer who was credited
    pub referrer_wallet: String,
    /// Bonus the referrer earned
    pub tokens_earned: f64,
}

/// The mining simulator core service
#[derive(Clone)]
pub struct MiningService {
    users: UserStore,
    sessions: SessionStore,
    balances: BalanceLedger,
    referrals: ReferralLedger,
    ads: AdRewardLog,
    auth: AuthTokens,
    lifecycle: SessionLifecycle,
    clock: Arc<dyn Clock>,
    config: MiningConfig,
}

impl MiningService {
    /// Open the service over a database directory with default configuration
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Arc::new(ParityDatabase::open(path)?);
        Self::new(db, MiningConfig::default(), Arc::new(SystemClock))
    }

    /// Build the service from its parts
    pub fn new(
        db: Arc<ParityDatabase>,
        config: MiningConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let users = UserStore::new(Arc::clone(&db))?;
        let sessions = SessionStore::new(Arc::clone(&db))?;
        let balances = BalanceLedger::new(Arc::clone(&db), users.clone())?;
        let referrals = ReferralLedger::new(
            Arc::clone(&db),
            users.clone(),
            balances.clone(),
            config.referral_bonus,
        )?;
        let ads = AdRewardLog::new(Arc::clone(&db), balances.clone(), &config)?;
        let auth = AuthTokens::new(config.auth_token_ttl_ms);
        let lifecycle = SessionLifecycle::new(
            sessions.clone(),
            users.clone(),
            referrals.clone(),
            balances.clone(),
            Arc::clone(&clock),
            config.clone(),
        );

        info!(
            "MiningService ready: {} users, {} sessions",
            users.len(),
            sessions.len()
        );

        Ok(Self {
            users,
            sessions,
            balances,
            referrals,
            ads,
            auth,
            lifecycle,
            clock,
            config,
        })
    }

    /// Register a wallet and log it in
    ///
    /// Fails with [`Error::Conflict`] if the wallet is already registered.
    pub fn register(&self, wallet_id: &str) -> Result<AuthSession> {
        let now_ms = self.clock.now_ms();
        let user = self.users.register(wallet_id, now_ms)?;
        let token = self.auth.issue(wallet_id, now_ms);
        Ok(AuthSession { user, token })
    }

    /// Log an existing wallet in (passwordless, by wallet id)
    ///
    /// Fails with [`Error::NotFound`] for unregistered wallets.
    pub fn login(&self, wallet_id: &str) -> Result<AuthSession> {
        let user = self.users.get(wallet_id)?;
        let token = self.auth.issue(wallet_id, self.clock.now_ms());
        Ok(AuthSession { user, token })
    }

    /// Profile snapshot for the calling user
    pub fn get_user(&self, token: &str) -> Result<UserProfile> {
        let wallet_id = self.verify(token)?;
        let user = self.users.get(&wallet_id)?;
        Ok(UserProfile {
            wallet_id: user.wallet_id,
            total_token: user.total_token,
            total_tokens_earned: user.total_tokens_earned,
            multiplier: user.multiplier,
            mining_status: user.mining_status,
            created_at_ms: user.created_at_ms,
        })
    }

    /// Start a mining session for the calling user
    pub fn start_mining(&self, token: &str, selected_hour: u32) -> Result<MiningSession> {
        let wallet_id = self.verify(token)?;
        self.lifecycle.start(&wallet_id, selected_hour)
    }

    /// The calling user's latest session with computed accrual
    pub fn mining_status(&self, token: &str) -> Result<Option<StatusReport>> {
        let wallet_id = self.verify(token)?;
        self.lifecycle.status(&wallet_id)
    }

    /// Step up the multiplier of one of the caller's sessions
    ///
    /// The rewarded-ad gate is the caller's responsibility; the core checks
    /// ownership, state, and the cap.
    pub fn upgrade_multiplier(&self, token: &str, session_id: SessionId) -> Result<MiningSession> {
        let wallet_id = self.verify(token)?;
        self.check_ownership(&wallet_id, session_id)?;
        self.lifecycle.upgrade_multiplier(session_id)
    }

    /// Claim one of the caller's sessions
    pub fn claim(&self, token: &str, session_id: SessionId) -> Result<ClaimOutcome> {
        let wallet_id = self.verify(token)?;
        self.check_ownership(&wallet_id, session_id)?;
        self.lifecycle.claim(session_id)
    }

    /// All users ranked by balance, descending
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.users.leaderboard()
    }

    /// Redeem a referral code for the calling user
    pub fn submit_referral_code(&self, token: &str, code: &str) -> Result<ReferralConfirmation> {
        let wallet_id = self.verify(token)?;
        let record: ReferralRecord = self
            .referrals
            .redeem(&wallet_id, code, self.clock.now_ms())?;
        Ok(ReferralConfirmation {
            referrer_wallet: record.referrer_wallet,
            tokens_earned: record.reward_tokens,
        })
    }

    /// Whether the calling user has redeemed a referral code
    pub fn check_referral_status(&self, token: &str) -> Result<bool> {
        let wallet_id = self.verify(token)?;
        Ok(self.referrals.has_redeemed(&wallet_id))
    }

    /// Credit a bounded random reward for a watched ad
    ///
    /// The wallet must match the calling user (the ad SDK reports a wallet;
    /// a mismatch is rejected rather than trusted).
    pub fn watch_ad(&self, token: &str, wallet_id: &str) -> Result<AdRewardOutcome> {
        let caller = self.verify(token)?;
        if caller != wallet_id {
            return Err(Error::Auth(format!(
                "wallet {} does not match the authenticated user",
                wallet_id
            )));
        }
        self.ads.watch(wallet_id, self.clock.now_ms())
    }

    /// The user store
    pub fn users(&self) -> &UserStore {
        &self.users
    }

    /// The session store
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The balance ledger
    pub fn balances(&self) -> &BalanceLedger {
        &self.balances
    }

    /// The referral ledger
    pub fn referrals(&self) -> &ReferralLedger {
        &self.referrals
    }

    /// The lifecycle manager
    pub fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    /// The configuration the service runs under
    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    fn verify(&self, token: &str) -> Result<String> {
        self.auth.verify(token, self.clock.now_ms())
    }

    fn check_ownership(&self, wallet_id: &str, session_id: SessionId) -> Result<()> {
        let session = self.sessions.get(session_id)?;
        if session.wallet_id != wallet_id {
            return Err(Error::Auth(format!(
                "session {} does not belong to the authenticated user",
                session_id
            )));
        }
        Ok(())
    }
}
