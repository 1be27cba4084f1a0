//! # CMT Core
//!
//! Persistent core of the CMT mining simulator: timed mining sessions with
//! multiplier upgrades, referral bonuses and commissions, ad rewards, and a
//! balance ledger behind a token leaderboard.
//!
//! This crate provides:
//! - Pure session accrual (elapsed/remaining/earned, never fails)
//! - Session lifecycle with atomic start and single-winner claim
//! - Referral ledger with one-time redemption per wallet
//! - A single balance-credit choke point with an audit log
//! - Bearer-token auth and a completion sweeper for notifications
//!
//! The UI, push delivery, and ad SDK are external collaborators that call in
//! through [`MiningService`].

#![warn(missing_docs, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod accrual;
pub mod ad_reward;
pub mod auth;
pub mod balance;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod referral;
pub mod service;
pub mod session_store;
pub mod sweep;
pub mod user_store;

pub use accrual::{accrue, claim_amount, planned_amount, Accrual};
pub use ad_reward::{AdRewardLog, AdRewardOutcome, AdRewardRecord};
pub use auth::AuthTokens;
pub use balance::{BalanceLedger, CreditReason, CreditRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AccrualMode, MiningConfig, PayoutPolicy};
pub use db::{DatabaseStatistics, ParityDatabase};
pub use error::{Error, Result};
pub use lifecycle::{ClaimOutcome, SessionLifecycle, StatusReport};
pub use referral::{ReferralLedger, ReferralRecord};
pub use service::{AuthSession, MiningService, ReferralConfirmation, UserProfile};
pub use session_store::{
    MiningSession, MultiplierSegment, SessionId, SessionStatus, SessionStore,
};
pub use sweep::{CompletionSweeper, LogNotificationSink, NotificationSink};
pub use user_store::{LeaderboardEntry, UserRecord, UserStore};
