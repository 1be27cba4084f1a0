//! Mining session storage with ParityDB backend
//!
//! Holds the session state machine (`Idle → Mining → Claimed`) and the two
//! operations that must be atomic to keep its invariants:
//! - at most one `Mining` session per wallet (checked and inserted under one
//!   write lock, so concurrent starts cannot both succeed);
//! - exactly one winner per claim (`Mining → Claimed` is a compare-and-swap
//!   under the same lock).
//!
//! A session is one record mutated in place through its full lifecycle.

use crate::accrual;
use crate::config::MiningConfig;
use crate::db::{ParityDatabase, CF_METADATA, CF_SESSIONS};
use crate::error::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Session identifier (unique, monotonically allocated)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Create a session id from its raw value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session lifecycle status
///
/// `Idle` and `ReadyToClaim` are declared for compatibility with the session
/// model but never produced; live sessions move `Mining → Claimed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// No session activity
    Idle,
    /// Session is accruing tokens
    Mining,
    /// Reserved: countdown finished, payout not yet claimed
    ReadyToClaim,
    /// Terminal: payout credited
    Claimed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Mining => "mining",
            SessionStatus::ReadyToClaim => "ready_to_claim",
            SessionStatus::Claimed => "claimed",
        };
        f.write_str(s)
    }
}

/// One stretch of a session run at a single multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplierSegment {
    /// Multiplier in effect for this segment
    pub multiplier: u32,
    /// When this segment started (Unix milliseconds)
    pub started_at_ms: u64,
}

/// A mining session record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningSession {
    /// Session identifier
    pub id: SessionId,
    /// Owning wallet
    pub wallet_id: String,
    /// Lifecycle status
    pub status: SessionStatus,
    /// Current multiplier (1 up to the configured cap)
    pub multiplier: u32,
    /// Planned duration in hours, chosen at start and immutable after
    pub selected_hour: u32,
    /// When mining started (Unix milliseconds); accrual falls back to
    /// `created_date_ms` when absent
    pub mining_start_time_ms: Option<u64>,
    /// When the current multiplier took effect (Unix milliseconds)
    pub current_multiplier_start_time_ms: u64,
    /// Multiplier history, one entry per start/upgrade
    pub segments: Vec<MultiplierSegment>,
    /// Final payout, set once at claim
    pub total_earned: f64,
    /// Creation timestamp (Unix milliseconds)
    pub created_date_ms: u64,
    /// Last mutation timestamp (Unix milliseconds)
    pub last_updated_ms: u64,
}

impl MiningSession {
    /// Create a new mining session starting now
    pub fn new(id: SessionId, wallet_id: String, selected_hour: u32, now_ms: u64) -> Self {
        Self {
            id,
            wallet_id,
            status: SessionStatus::Mining,
            multiplier: 1,
            selected_hour,
            mining_start_time_ms: Some(now_ms),
            current_multiplier_start_time_ms: now_ms,
            segments: vec![MultiplierSegment {
                multiplier: 1,
                started_at_ms: now_ms,
            }],
            total_earned: 0.0,
            created_date_ms: now_ms,
            last_updated_ms: now_ms,
        }
    }

    /// When accrual starts: the mining start time, or the creation time when
    /// the start time is missing
    pub fn start_time_ms(&self) -> u64 {
        self.mining_start_time_ms.unwrap_or(self.created_date_ms)
    }

    /// Planned duration in seconds; a zero `selected_hour` reads as one hour
    pub fn planned_seconds(&self) -> u64 {
        u64::from(self.selected_hour.max(1)) * 3600
    }

    /// Get the storage key for this session
    pub fn storage_key(&self) -> String {
        Self::key_for(self.id)
    }

    /// Storage key for a session id
    pub fn key_for(id: SessionId) -> String {
        format!("session:{}", id)
    }
}

const SESSION_INDEX_KEY: &str = "session:index";
const SESSION_COUNTER_KEY: &str = "session:next_id";

/// Session store with ParityDB backend
///
/// The in-memory map is authoritative and loaded from the database at
/// startup; every mutation writes through before it becomes visible.
#[derive(Clone)]
pub struct SessionStore {
    db: Arc<ParityDatabase>,
    sessions: Arc<RwLock<HashMap<u64, MiningSession>>>,
    next_id: Arc<RwLock<u64>>,
}

impl SessionStore {
    /// Open the session store, loading all persisted sessions
    pub fn new(db: Arc<ParityDatabase>) -> Result<Self> {
        let mut sessions = HashMap::new();

        let ids: Vec<u64> = match db.get(CF_SESSIONS, SESSION_INDEX_KEY.as_bytes())? {
            Some(data) => serde_json::from_slice(&data)?,
            None => Vec::new(),
        };
        for id in &ids {
            let key = MiningSession::key_for(SessionId::new(*id));
            if let Some(data) = db.get(CF_SESSIONS, key.as_bytes())? {
                let session: MiningSession = bincode::deserialize(&data)?;
                sessions.insert(*id, session);
            }
        }

        let next_id = match db.get(CF_METADATA, SESSION_COUNTER_KEY.as_bytes())? {
            Some(data) => bincode::deserialize(&data)?,
            None => ids.iter().max().map_or(1, |max| max + 1),
        };

        info!(
            "Initializing SessionStore with {} sessions, next id {}",
            sessions.len(),
            next_id
        );

        Ok(Self {
            db,
            sessions: Arc::new(RwLock::new(sessions)),
            next_id: Arc::new(RwLock::new(next_id)),
        })
    }

    /// Start a new mining session for a wallet
    ///
    /// Fails with [`Error::Conflict`] if the wallet already has a `Mining`
    /// session. The check and the insert happen under one write lock, so two
    /// concurrent starts cannot both succeed.
    pub fn create_mining(
        &self,
        wallet_id: &str,
        selected_hour: u32,
        now_ms: u64,
    ) -> Result<MiningSession> {
        let mut sessions = self.sessions.write();

        if sessions
            .values()
            .any(|s| s.wallet_id == wallet_id && s.status == SessionStatus::Mining)
        {
            return Err(Error::Conflict(format!(
                "active mining session already exists for wallet {}",
                wallet_id
            )));
        }

        let id = {
            let mut next_id = self.next_id.write();
            let id = *next_id;
            *next_id += 1;
            let counter = bincode::serialize(&*next_id)?;
            self.db
                .put(CF_METADATA, SESSION_COUNTER_KEY.as_bytes(), &counter)?;
            SessionId::new(id)
        };

        let session = MiningSession::new(id, wallet_id.to_string(), selected_hour, now_ms);

        let mut ids: Vec<u64> = sessions.keys().copied().collect();
        ids.push(id.value());
        ids.sort_unstable();

        // Record and index land in one commit.
        self.db.batch_write(
            CF_SESSIONS,
            &[
                (
                    session.storage_key().into_bytes(),
                    bincode::serialize(&session)?,
                ),
                (
                    SESSION_INDEX_KEY.as_bytes().to_vec(),
                    serde_json::to_vec(&ids)?,
                ),
            ],
        )?;

        sessions.insert(id.value(), session.clone());

        info!(
            "Mining session {} started for wallet {} ({}h, multiplier 1)",
            id, wallet_id, selected_hour
        );

        Ok(session)
    }

    /// Get a session by id
    pub fn get(&self, id: SessionId) -> Result<MiningSession> {
        self.try_get(id)
            .ok_or_else(|| Error::NotFound(format!("session {}", id)))
    }

    /// Get a session by id, if it exists
    pub fn try_get(&self, id: SessionId) -> Option<MiningSession> {
        self.sessions.read().get(&id.value()).cloned()
    }

    /// Most recent session for a wallet, regardless of status
    pub fn latest_for_wallet(&self, wallet_id: &str) -> Option<MiningSession> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.wallet_id == wallet_id)
            .max_by_key(|s| (s.created_date_ms, s.id.value()))
            .cloned()
    }

    /// The wallet's `Mining` session, if one exists
    pub fn active_for_wallet(&self, wallet_id: &str) -> Option<MiningSession> {
        self.sessions
            .read()
            .values()
            .find(|s| s.wallet_id == wallet_id && s.status == SessionStatus::Mining)
            .cloned()
    }

    /// All `Mining` sessions across wallets
    pub fn active_sessions(&self) -> Vec<MiningSession> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.status == SessionStatus::Mining)
            .cloned()
            .collect()
    }

    /// All sessions for a wallet, newest first
    pub fn sessions_for_wallet(&self, wallet_id: &str) -> Vec<MiningSession> {
        let mut sessions: Vec<MiningSession> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.wallet_id == wallet_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| std::cmp::Reverse((s.created_date_ms, s.id.value())));
        sessions
    }

    /// Step the session's multiplier up by one
    ///
    /// Fails with [`Error::InvalidState`] unless the session is `Mining`, and
    /// with [`Error::LimitExceeded`] at the cap. Resets the current-multiplier
    /// start time and appends a segment to the multiplier history.
    pub fn upgrade_multiplier(
        &self,
        id: SessionId,
        max_multiplier: u32,
        now_ms: u64,
    ) -> Result<MiningSession> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&id.value())
            .ok_or_else(|| Error::NotFound(format!("session {}", id)))?;

        if session.status != SessionStatus::Mining {
            return Err(Error::InvalidState(format!(
                "can only upgrade while mining, session {} is {}",
                id, session.status
            )));
        }
        if session.multiplier >= max_multiplier {
            return Err(Error::LimitExceeded(session.multiplier));
        }

        session.multiplier += 1;
        session.current_multiplier_start_time_ms = now_ms;
        session.segments.push(MultiplierSegment {
            multiplier: session.multiplier,
            started_at_ms: now_ms,
        });
        session.last_updated_ms = now_ms;

        let updated = session.clone();
        self.persist(&updated)?;

        debug!(
            "Session {} multiplier upgraded to {}",
            id, updated.multiplier
        );

        Ok(updated)
    }

    /// Claim the session: compute the payout and transition to `Claimed`
    ///
    /// The payout is computed and the `Mining → Claimed` swap applied under
    /// one write lock, so of two concurrent claims exactly one returns the
    /// payout and the other gets [`Error::AlreadyClaimed`].
    ///
    /// Returns the claimed session and the gross payout (before any referral
    /// commission split).
    pub fn transition_to_claimed(
        &self,
        id: SessionId,
        now_ms: u64,
        config: &MiningConfig,
    ) -> Result<(MiningSession, f64)> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&id.value())
            .ok_or_else(|| Error::NotFound(format!("session {}", id)))?;

        match session.status {
            SessionStatus::Claimed => return Err(Error::AlreadyClaimed(id.value())),
            SessionStatus::Mining => {}
            other => {
                return Err(Error::InvalidState(format!(
                    "can only claim a mining session, session {} is {}",
                    id, other
                )));
            }
        }

        let gross = accrual::claim_amount(session, now_ms, config);
        session.status = SessionStatus::Claimed;
        session.total_earned = gross;
        session.last_updated_ms = now_ms;

        let claimed = session.clone();
        self.persist(&claimed)?;

        info!("Session {} claimed, gross payout {:.2}", id, gross);

        Ok((claimed, gross))
    }

    /// Number of sessions in the store
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether the store holds no sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    fn persist(&self, session: &MiningSession) -> Result<()> {
        let data = bincode::serialize(session)?;
        self.db
            .put(CF_SESSIONS, session.storage_key().as_bytes(), &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_starts_mining_at_multiplier_one() {
        let session =
            MiningSession::new(SessionId::new(1), "wallet-a".to_string(), 4, 50_000);
        assert_eq!(session.status, SessionStatus::Mining);
        assert_eq!(session.multiplier, 1);
        assert_eq!(session.planned_seconds(), 4 * 3600);
        assert_eq!(session.start_time_ms(), 50_000);
        assert_eq!(session.segments.len(), 1);
    }

    #[test]
    fn test_start_time_falls_back_to_created_date() {
        let mut session =
            MiningSession::new(SessionId::new(1), "wallet-a".to_string(), 1, 7_000);
        session.mining_start_time_ms = None;
        assert_eq!(session.start_time_ms(), 7_000);
    }

    #[test]
    fn test_zero_selected_hour_reads_as_one_hour() {
        let session =
            MiningSession::new(SessionId::new(1), "wallet-a".to_string(), 0, 0);
        assert_eq!(session.planned_seconds(), 3600);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SessionStatus::Mining.to_string(), "mining");
        assert_eq!(SessionStatus::ReadyToClaim.to_string(), "ready_to_claim");
    }
}
