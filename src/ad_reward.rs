//! Rewarded ad log
//!
//! Append-only record of ad watches. Each watch rolls a bounded random
//! reward and credits it through the Balance Ledger. The ad SDK integration
//! itself is an external collaborator; this log only trusts the caller's
//! assertion that an ad was watched.

use crate::balance::{BalanceLedger, CreditReason};
use crate::config::MiningConfig;
use crate::db::{ParityDatabase, CF_AD_REWARDS, CF_METADATA};
use crate::error::Result;
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// One rewarded ad watch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdRewardRecord {
    /// Sequence number, unique and increasing
    pub seq: u64,
    /// Rewarded wallet
    pub wallet_id: String,
    /// Reward amount, within the configured bounds
    pub reward_amount: f64,
    /// When the ad was watched (Unix milliseconds)
    pub watched_at_ms: u64,
}

impl AdRewardRecord {
    /// Get the storage key for this reward
    pub fn storage_key(&self) -> String {
        format!("ad_reward:{}", self.seq)
    }
}

/// Outcome of a rewarded ad watch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdRewardOutcome {
    /// Reward credited for this watch
    pub reward_earned: f64,
    /// Wallet balance after the credit
    pub new_total_token: f64,
}

const AD_REWARD_COUNTER_KEY: &str = "ad_reward:next_seq";

/// Append-only ad reward log with ParityDB backend
#[derive(Clone)]
pub struct AdRewardLog {
    db: Arc<ParityDatabase>,
    balances: BalanceLedger,
    log: Arc<RwLock<Vec<AdRewardRecord>>>,
    next_seq: Arc<RwLock<u64>>,
    reward_min: u32,
    reward_max: u32,
}

impl AdRewardLog {
    /// Create the ad reward log
    pub fn new(
        db: Arc<ParityDatabase>,
        balances: BalanceLedger,
        config: &MiningConfig,
    ) -> Result<Self> {
        let next_seq = match db.get(CF_METADATA, AD_REWARD_COUNTER_KEY.as_bytes())? {
            Some(data) => bincode::deserialize(&data)?,
            None => 1,
        };

        info!("Initializing AdRewardLog, next seq {}", next_seq);

        Ok(Self {
            db,
            balances,
            log: Arc::new(RwLock::new(Vec::new())),
            next_seq: Arc::new(RwLock::new(next_seq)),
            reward_min: config.ad_reward_min,
            reward_max: config.ad_reward_max,
        })
    }

    /// Record an ad watch: roll a reward, log it, and credit the wallet
    pub fn watch(&self, wallet_id: &str, now_ms: u64) -> Result<AdRewardOutcome> {
        let rolled = rand::thread_rng().gen_range(self.reward_min..=self.reward_max);
        let reward = f64::from(rolled);

        let seq = {
            let mut next_seq = self.next_seq.write();
            let seq = *next_seq;
            *next_seq += 1;
            let counter = bincode::serialize(&*next_seq)?;
            self.db
                .put(CF_METADATA, AD_REWARD_COUNTER_KEY.as_bytes(), &counter)?;
            seq
        };

        let record = AdRewardRecord {
            seq,
            wallet_id: wallet_id.to_string(),
            reward_amount: reward,
            watched_at_ms: now_ms,
        };

        let data = bincode::serialize(&record)?;
        self.db
            .put(CF_AD_REWARDS, record.storage_key().as_bytes(), &data)?;
        self.log.write().push(record);

        let credit = self
            .balances
            .credit(wallet_id, reward, CreditReason::AdReward, now_ms)?;

        debug!("Ad reward for {}: {:.0} tokens", wallet_id, reward);

        Ok(AdRewardOutcome {
            reward_earned: reward,
            new_total_token: credit.new_balance,
        })
    }

    /// Rewards recorded for a wallet this process lifetime, oldest first
    pub fn rewards_for(&self, wallet_id: &str) -> Vec<AdRewardRecord> {
        self.log
            .read()
            .iter()
            .filter(|r| r.wallet_id == wallet_id)
            .cloned()
            .collect()
    }
}
