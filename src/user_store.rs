//! User storage with ParityDB backend
//!
//! Stores one record per registered wallet: the cumulative token balance,
//! lifetime earnings, and a denormalized snapshot of the wallet's latest
//! mining activity. Balances move only through the Balance Ledger's credit
//! path; this store exposes the mutation crate-privately so nothing else can
//! bypass that choke point.

use crate::db::{ParityDatabase, CF_USERS};
use crate::error::{Error, Result};
use crate::session_store::SessionStatus;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Wallet identifier, unique and immutable
    pub wallet_id: String,
    /// Cumulative token balance, never negative
    pub total_token: f64,
    /// Lifetime earnings, monotonically non-decreasing
    pub total_tokens_earned: f64,
    /// Snapshot of the latest session's status
    pub mining_status: SessionStatus,
    /// Snapshot of the latest session's multiplier
    pub multiplier: u32,
    /// Registration timestamp (Unix milliseconds)
    pub created_at_ms: u64,
    /// Last mutation timestamp (Unix milliseconds)
    pub last_updated_ms: u64,
}

impl UserRecord {
    /// Create a fresh user record
    pub fn new(wallet_id: String, now_ms: u64) -> Self {
        Self {
            wallet_id,
            total_token: 0.0,
            total_tokens_earned: 0.0,
            mining_status: SessionStatus::Idle,
            multiplier: 1,
            created_at_ms: now_ms,
            last_updated_ms: now_ms,
        }
    }

    /// Get the storage key for this user
    pub fn storage_key(&self) -> String {
        Self::key_for(&self.wallet_id)
    }

    /// Storage key for a wallet id
    pub fn key_for(wallet_id: &str) -> String {
        format!("user:{}", wallet_id)
    }
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Wallet identifier
    pub wallet_id: String,
    /// Cumulative token balance
    pub total_token: f64,
}

const USER_INDEX_KEY: &str = "user:index";

/// User store with ParityDB backend
#[derive(Clone)]
pub struct UserStore {
    db: Arc<ParityDatabase>,
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
}

impl UserStore {
    /// Open the user store, loading all persisted users
    pub fn new(db: Arc<ParityDatabase>) -> Result<Self> {
        let mut users = HashMap::new();

        let wallets: Vec<String> = match db.get(CF_USERS, USER_INDEX_KEY.as_bytes())? {
            Some(data) => serde_json::from_slice(&data)?,
            None => Vec::new(),
        };
        for wallet_id in &wallets {
            let key = UserRecord::key_for(wallet_id);
            if let Some(data) = db.get(CF_USERS, key.as_bytes())? {
                let record: UserRecord = bincode::deserialize(&data)?;
                users.insert(wallet_id.clone(), record);
            }
        }

        info!("Initializing UserStore with {} users", users.len());

        Ok(Self {
            db,
            users: Arc::new(RwLock::new(users)),
        })
    }

    /// Register a new wallet
    ///
    /// Fails with [`Error::Conflict`] if the wallet is already registered.
    pub fn register(&self, wallet_id: &str, now_ms: u64) -> Result<UserRecord> {
        let mut users = self.users.write();

        if users.contains_key(wallet_id) {
            return Err(Error::Conflict(format!(
                "wallet {} is already registered",
                wallet_id
            )));
        }

        let record = UserRecord::new(wallet_id.to_string(), now_ms);

        let mut wallets: Vec<String> = users.keys().cloned().collect();
        wallets.push(wallet_id.to_string());
        wallets.sort_unstable();

        // Record and index land in one commit.
        self.db.batch_write(
            CF_USERS,
            &[
                (
                    record.storage_key().into_bytes(),
                    bincode::serialize(&record)?,
                ),
                (
                    USER_INDEX_KEY.as_bytes().to_vec(),
                    serde_json::to_vec(&wallets)?,
                ),
            ],
        )?;

        users.insert(wallet_id.to_string(), record.clone());

        info!("User registered: {}", wallet_id);

        Ok(record)
    }

    /// Get a user by wallet id
    pub fn get(&self, wallet_id: &str) -> Result<UserRecord> {
        self.try_get(wallet_id)
            .ok_or_else(|| Error::NotFound(format!("user {}", wallet_id)))
    }

    /// Get a user by wallet id, if one is registered
    pub fn try_get(&self, wallet_id: &str) -> Option<UserRecord> {
        self.users.read().get(wallet_id).cloned()
    }

    /// Whether the wallet is registered
    pub fn contains(&self, wallet_id: &str) -> bool {
        self.users.read().contains_key(wallet_id)
    }

    /// Refresh the user's mining snapshot after a lifecycle event
    pub fn set_mining_snapshot(
        &self,
        wallet_id: &str,
        status: SessionStatus,
        multiplier: u32,
        now_ms: u64,
    ) -> Result<UserRecord> {
        let mut users = self.users.write();
        let record = users
            .get_mut(wallet_id)
            .ok_or_else(|| Error::NotFound(format!("user {}", wallet_id)))?;

        record.mining_status = status;
        record.multiplier = multiplier;
        record.last_updated_ms = now_ms;

        let updated = record.clone();
        self.persist(&updated)?;

        debug!(
            "User {} snapshot: status={}, multiplier={}",
            wallet_id, status, multiplier
        );

        Ok(updated)
    }

    /// Apply a credit to the wallet's balances
    ///
    /// Only the Balance Ledger calls this; amount validation happens there.
    pub(crate) fn apply_credit(
        &self,
        wallet_id: &str,
        amount: f64,
        now_ms: u64,
    ) -> Result<UserRecord> {
        let mut users = self.users.write();
        let record = users
            .get_mut(wallet_id)
            .ok_or_else(|| Error::NotFound(format!("user {}", wallet_id)))?;

        record.total_token += amount;
        record.total_tokens_earned += amount;
        record.last_updated_ms = now_ms;

        let updated = record.clone();
        self.persist(&updated)?;

        Ok(updated)
    }

    /// All users ranked by balance, strictly descending
    ///
    /// Ties keep a stable order by wallet id.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let users = self.users.read();
        let mut entries: Vec<LeaderboardEntry> = users
            .values()
            .map(|u| LeaderboardEntry {
                wallet_id: u.wallet_id.clone(),
                total_token: u.total_token,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.total_token
                .partial_cmp(&a.total_token)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.wallet_id.cmp(&b.wallet_id))
        });
        entries
    }

    /// Number of registered users
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Whether no users are registered
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    fn persist(&self, record: &UserRecord) -> Result<()> {
        let data = bincode::serialize(record)?;
        self.db
            .put(CF_USERS, record.storage_key().as_bytes(), &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_starts_empty_and_idle() {
        let record = UserRecord::new("wallet-a".to_string(), 1_000);
        assert_eq!(record.total_token, 0.0);
        assert_eq!(record.total_tokens_earned, 0.0);
        assert_eq!(record.mining_status, SessionStatus::Idle);
        assert_eq!(record.multiplier, 1);
    }

    #[test]
    fn test_storage_key_shape() {
        let record = UserRecord::new("abc".to_string(), 0);
        assert_eq!(record.storage_key(), "user:abc");
    }
}
