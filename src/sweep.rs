//! Completion sweeper
//!
//! Auxiliary diagnostic that scans mining sessions for finished countdowns
//! and hands each one to a notification sink exactly once. Correctness never
//! depends on it: accrual is computed on demand. The core stays
//! request/response, so callers own the sweep cadence (the original ran it
//! from a one-minute cron).

use crate::accrual;
use crate::clock::Clock;
use crate::config::MiningConfig;
use crate::session_store::{MiningSession, SessionStore};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Receives completion notifications
///
/// Push delivery is an external collaborator; implementations forward to
/// whatever channel the host application uses. Delivery failures are the
/// sink's problem, not the sweeper's.
pub trait NotificationSink: Send + Sync {
    /// A session's planned window has fully elapsed
    fn session_completed(&self, session: &MiningSession, earned: f64);
}

/// Sink that logs completions via `tracing`
#[derive(Debug, Clone, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn session_completed(&self, session: &MiningSession, earned: f64) {
        info!(
            "Mining complete for session {} (wallet {}, {}h): {:.2} tokens",
            session.id, session.wallet_id, session.selected_hour, earned
        );
    }
}

/// Scans for completed mining sessions and notifies each once
pub struct CompletionSweeper {
    sessions: SessionStore,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    config: MiningConfig,
    notified: Mutex<HashSet<u64>>,
}

impl CompletionSweeper {
    /// Create a sweeper over the session store
    pub fn new(
        sessions: SessionStore,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        config: MiningConfig,
    ) -> Self {
        Self {
            sessions,
            sink,
            clock,
            config,
            notified: Mutex::new(HashSet::new()),
        }
    }

    /// Scan once; returns how many sessions were newly notified
    pub fn run_once(&self) -> usize {
        let now_ms = self.clock.now_ms();
        let active = self.sessions.active_sessions();
        debug!("Sweeping {} active sessions", active.len());

        let mut notified = self.notified.lock();
        let mut count = 0;

        for session in &active {
            if notified.contains(&session.id.value()) {
                continue;
            }
            let snapshot = accrual::accrue(session, now_ms, &self.config);
            if snapshot.is_complete {
                let earned = accrual::planned_amount(session, &self.config);
                self.sink.session_completed(session, earned);
                notified.insert(session.id.value());
                count += 1;
            }
        }

        count
    }

    /// Forget which sessions were notified
    ///
    /// The original cleared its notified cache hourly; callers pick their own
    /// retention.
    pub fn clear_notified(&self) {
        self.notified.lock().clear();
    }

    /// Number of sessions currently marked as notified
    pub fn notified_count(&self) -> usize {
        self.notified.lock().len()
    }
}
