//! Balance ledger
//!
//! The single choke point for every token increase in the crate: claim
//! payouts, referral bonuses, referral commissions, and ad rewards all land
//! here. Credits validate the amount, bump both user balance fields, and
//! append to a persistent audit log.

use crate::db::{ParityDatabase, CF_CREDITS, CF_METADATA};
use crate::error::{Error, Result};
use crate::user_store::{UserRecord, UserStore};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Why a credit was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditReason {
    /// Mining session claim payout (net of commission)
    ClaimPayout,
    /// Fixed bonus for a redeemed referral code
    ReferralBonus,
    /// Commission share of a referred user's claim
    ReferralCommission,
    /// Rewarded ad watch
    AdReward,
}

impl fmt::Display for CreditReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CreditReason::ClaimPayout => "claim_payout",
            CreditReason::ReferralBonus => "referral_bonus",
            CreditReason::ReferralCommission => "referral_commission",
            CreditReason::AdReward => "ad_reward",
        };
        f.write_str(s)
    }
}

/// One applied credit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditRecord {
    /// Sequence number, unique and increasing
    pub seq: u64,
    /// Credited wallet
    pub wallet_id: String,
    /// Credited amount
    pub amount: f64,
    /// Why the credit was applied
    pub reason: CreditReason,
    /// When the credit was applied (Unix milliseconds)
    pub credited_at_ms: u64,
    /// Wallet balance after the credit
    pub new_balance: f64,
}

impl CreditRecord {
    /// Get the storage key for this credit
    pub fn storage_key(&self) -> String {
        format!("credit:{}", self.seq)
    }
}

const CREDIT_COUNTER_KEY: &str = "credit:next_seq";

/// Balance ledger over the user store
#[derive(Clone)]
pub struct BalanceLedger {
    db: Arc<ParityDatabase>,
    users: UserStore,
    log: Arc<RwLock<Vec<CreditRecord>>>,
    next_seq: Arc<RwLock<u64>>,
}

impl BalanceLedger {
    /// Create the balance ledger over a user store
    pub fn new(db: Arc<ParityDatabase>, users: UserStore) -> Result<Self> {
        let next_seq = match db.get(CF_METADATA, CREDIT_COUNTER_KEY.as_bytes())? {
            Some(data) => bincode::deserialize(&data)?,
            None => 1,
        };

        info!("Initializing BalanceLedger, next credit seq {}", next_seq);

        Ok(Self {
            db,
            users,
            log: Arc::new(RwLock::new(Vec::new())),
            next_seq: Arc::new(RwLock::new(next_seq)),
        })
    }

    /// Credit a wallet
    ///
    /// Fails with [`Error::InvalidAmount`] for negative or non-finite
    /// amounts and [`Error::NotFound`] for unregistered wallets. On success
    /// both `total_token` and `total_tokens_earned` increase by `amount` and
    /// the credit is appended to the audit log.
    pub fn credit(
        &self,
        wallet_id: &str,
        amount: f64,
        reason: CreditReason,
        now_ms: u64,
    ) -> Result<CreditRecord> {
        if !amount.is_finite() {
            return Err(Error::InvalidAmount(format!(
                "credit amount must be finite, got {}",
                amount
            )));
        }
        if amount < 0.0 {
            return Err(Error::InvalidAmount(format!(
                "credit amount must be non-negative, got {}",
                amount
            )));
        }

        let user = self.users.apply_credit(wallet_id, amount, now_ms)?;

        let seq = {
            let mut next_seq = self.next_seq.write();
            let seq = *next_seq;
            *next_seq += 1;
            let counter = bincode::serialize(&*next_seq)?;
            self.db
                .put(CF_METADATA, CREDIT_COUNTER_KEY.as_bytes(), &counter)?;
            seq
        };

        let record = CreditRecord {
            seq,
            wallet_id: wallet_id.to_string(),
            amount,
            reason,
            credited_at_ms: now_ms,
            new_balance: user.total_token,
        };

        let data = bincode::serialize(&record)?;
        self.db
            .put(CF_CREDITS, record.storage_key().as_bytes(), &data)?;
        self.log.write().push(record.clone());

        debug!(
            "Credited {:.2} to {} ({}), balance now {:.2}",
            amount, wallet_id, reason, user.total_token
        );

        Ok(record)
    }

    /// Current balance for a wallet
    pub fn balance(&self, wallet_id: &str) -> Result<f64> {
        Ok(self.users.get(wallet_id)?.total_token)
    }

    /// Credits applied to a wallet this process lifetime, oldest first
    pub fn credits_for(&self, wallet_id: &str) -> Vec<CreditRecord> {
        self.log
            .read()
            .iter()
            .filter(|c| c.wallet_id == wallet_id)
            .cloned()
            .collect()
    }

    /// The user record behind a wallet
    pub fn user(&self, wallet_id: &str) -> Result<UserRecord> {
        self.users.get(wallet_id)
    }
}
