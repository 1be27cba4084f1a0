//! Error types for mining, referral, and ledger operations

use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// The operation would duplicate existing state (an overlapping mining
    /// session, or a wallet that is already registered)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation is not valid for the session's current status
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Multiplier is already at the configured cap
    #[error("Multiplier cap reached at {0}")]
    LimitExceeded(u32),

    /// Requested user or session does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Session has already been claimed
    #[error("Session {0} has already been claimed")]
    AlreadyClaimed(u64),

    /// A wallet tried to redeem its own referral code
    #[error("Wallet {0} cannot redeem its own referral code")]
    SelfReferral(String),

    /// Referral code does not name a registered wallet
    #[error("Invalid referral code: {0}")]
    InvalidCode(String),

    /// Wallet has already redeemed a referral code
    #[error("Wallet {0} has already redeemed a referral code")]
    AlreadyRedeemed(String),

    /// Credit amount is negative, non-finite, or otherwise unusable
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Missing, malformed, or expired auth token
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Storage backend error (ParityDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Bincode serialization error
    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for mining core operations
pub type Result<T> = std::result::Result<T, Error>;
