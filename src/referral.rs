//! Referral ledger
//!
//! A referral code is simply an existing wallet id. Each wallet may redeem
//! one code ever; redeeming immediately pays the referrer a fixed bonus, and
//! every later claim by the redeemer pays the referrer a commission share
//! (applied by the lifecycle manager via [`ReferralLedger::commission_for`]).
//!
//! Uniqueness on the redeeming wallet is enforced under the ledger's write
//! lock, so concurrent redemptions for one wallet produce exactly one record.

use crate::balance::{BalanceLedger, CreditReason};
use crate::db::{ParityDatabase, CF_REFERRALS};
use crate::error::{Error, Result};
use crate::user_store::UserStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A one-time referral redemption
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralRecord {
    /// Wallet whose code was redeemed
    pub referrer_wallet: String,
    /// Wallet that redeemed the code; unique across all records
    pub referred_wallet: String,
    /// Bonus paid to the referrer at redemption
    pub reward_tokens: f64,
    /// When the code was redeemed (Unix milliseconds)
    pub claimed_at_ms: u64,
}

impl ReferralRecord {
    /// Get the storage key for this referral
    pub fn storage_key(&self) -> String {
        Self::key_for(&self.referred_wallet)
    }

    /// Storage key for a redeeming wallet
    pub fn key_for(referred_wallet: &str) -> String {
        format!("referral:{}", referred_wallet)
    }
}

const REFERRAL_INDEX_KEY: &str = "referral:index";

/// Referral ledger with ParityDB backend
#[derive(Clone)]
pub struct ReferralLedger {
    db: Arc<ParityDatabase>,
    users: UserStore,
    balances: BalanceLedger,
    /// Redemptions keyed by the redeeming (referred) wallet
    referrals: Arc<RwLock<HashMap<String, ReferralRecord>>>,
    referral_bonus: f64,
}

impl ReferralLedger {
    /// Open the referral ledger, loading all persisted redemptions
    pub fn new(
        db: Arc<ParityDatabase>,
        users: UserStore,
        balances: BalanceLedger,
        referral_bonus: f64,
    ) -> Result<Self> {
        let mut referrals = HashMap::new();

        let wallets: Vec<String> = match db.get(CF_REFERRALS, REFERRAL_INDEX_KEY.as_bytes())? {
            Some(data) => serde_json::from_slice(&data)?,
            None => Vec::new(),
        };
        for wallet_id in &wallets {
            let key = ReferralRecord::key_for(wallet_id);
            if let Some(data) = db.get(CF_REFERRALS, key.as_bytes())? {
                let record: ReferralRecord = bincode::deserialize(&data)?;
                referrals.insert(wallet_id.clone(), record);
            }
        }

        info!("Initializing ReferralLedger with {} redemptions", referrals.len());

        Ok(Self {
            db,
            users,
            balances,
            referrals: Arc::new(RwLock::new(referrals)),
            referral_bonus,
        })
    }

    /// Redeem a referral code for a wallet
    ///
    /// The code must name a registered wallet other than the redeemer, and
    /// the redeemer must not have redeemed before. On success the referrer is
    /// immediately credited the fixed bonus.
    pub fn redeem(&self, referred_wallet: &str, code: &str, now_ms: u64) -> Result<ReferralRecord> {
        if code == referred_wallet {
            return Err(Error::SelfReferral(referred_wallet.to_string()));
        }
        if !self.users.contains(code) {
            return Err(Error::InvalidCode(code.to_string()));
        }

        let record = {
            let mut referrals = self.referrals.write();

            if referrals.contains_key(referred_wallet) {
                return Err(Error::AlreadyRedeemed(referred_wallet.to_string()));
            }

            let record = ReferralRecord {
                referrer_wallet: code.to_string(),
                referred_wallet: referred_wallet.to_string(),
                reward_tokens: self.referral_bonus,
                claimed_at_ms: now_ms,
            };

            let mut wallets: Vec<String> = referrals.keys().cloned().collect();
            wallets.push(referred_wallet.to_string());
            wallets.sort_unstable();

            // Record and index land in one commit.
            self.db.batch_write(
                CF_REFERRALS,
                &[
                    (
                        record.storage_key().into_bytes(),
                        bincode::serialize(&record)?,
                    ),
                    (
                        REFERRAL_INDEX_KEY.as_bytes().to_vec(),
                        serde_json::to_vec(&wallets)?,
                    ),
                ],
            )?;

            referrals.insert(referred_wallet.to_string(), record.clone());
            record
        };

        self.balances.credit(
            code,
            self.referral_bonus,
            CreditReason::ReferralBonus,
            now_ms,
        )?;

        info!(
            "Referral redeemed: {} referred by {}, bonus {:.0}",
            referred_wallet, code, self.referral_bonus
        );

        Ok(record)
    }

    /// The wallet's referrer, if it redeemed a code
    ///
    /// Pure lookup used by claim to decide whether to split earnings.
    pub fn commission_for(&self, wallet_id: &str) -> Option<String> {
        self.referrals
            .read()
            .get(wallet_id)
            .map(|r| r.referrer_wallet.clone())
    }

    /// Whether the wallet has redeemed a referral code
    pub fn has_redeemed(&self, wallet_id: &str) -> bool {
        let redeemed = self.referrals.read().contains_key(wallet_id);
        debug!("Referral status for {}: {}", wallet_id, redeemed);
        redeemed
    }

    /// Number of recorded redemptions
    pub fn len(&self) -> usize {
        self.referrals.read().len()
    }

    /// Whether no redemptions are recorded
    pub fn is_empty(&self) -> bool {
        self.referrals.read().is_empty()
    }
}
