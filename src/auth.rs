//! Bearer token authentication
//!
//! Opaque random tokens mapped to wallet ids with a fixed TTL. Tokens are
//! process-local, like the signing secret of the stateless scheme they
//! replace; expired entries are evicted when they are next presented.

use crate::error::{Error, Result};
use dashmap::DashMap;
use rand::RngCore;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct TokenEntry {
    wallet_id: String,
    expires_at_ms: u64,
}

/// Issued token table
#[derive(Clone)]
pub struct AuthTokens {
    tokens: Arc<DashMap<String, TokenEntry>>,
    ttl_ms: u64,
}

impl AuthTokens {
    /// Create a token table with the given token lifetime
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            tokens: Arc::new(DashMap::new()),
            ttl_ms,
        }
    }

    /// Issue a fresh token for a wallet
    pub fn issue(&self, wallet_id: &str, now_ms: u64) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        self.tokens.insert(
            token.clone(),
            TokenEntry {
                wallet_id: wallet_id.to_string(),
                expires_at_ms: now_ms + self.ttl_ms,
            },
        );

        debug!("Issued auth token for {}", wallet_id);

        token
    }

    /// Resolve a token to its wallet id
    ///
    /// Fails with [`Error::Auth`] for unknown or expired tokens; expired
    /// entries are removed on sight.
    pub fn verify(&self, token: &str, now_ms: u64) -> Result<String> {
        let entry = self
            .tokens
            .get(token)
            .ok_or_else(|| Error::Auth("unknown token".to_string()))?;

        if now_ms >= entry.expires_at_ms {
            drop(entry);
            self.tokens.remove(token);
            return Err(Error::Auth("token expired".to_string()));
        }

        Ok(entry.wallet_id.clone())
    }

    /// Drop all tokens issued to a wallet
    pub fn revoke_wallet(&self, wallet_id: &str) {
        self.tokens.retain(|_, entry| entry.wallet_id != wallet_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_then_verify_resolves_wallet() {
        let tokens = AuthTokens::new(1_000);
        let token = tokens.issue("wallet-a", 0);
        assert_eq!(tokens.verify(&token, 500).expect("verify failed"), "wallet-a");
    }

    #[test]
    fn test_unknown_token_is_auth_error() {
        let tokens = AuthTokens::new(1_000);
        assert!(matches!(
            tokens.verify("deadbeef", 0),
            Err(Error::Auth(_))
        ));
    }

    #[test]
    fn test_expired_token_is_auth_error_and_evicted() {
        let tokens = AuthTokens::new(1_000);
        let token = tokens.issue("wallet-a", 0);

        assert!(matches!(tokens.verify(&token, 1_000), Err(Error::Auth(_))));
        // Evicted: still rejected even if the clock rolls back.
        assert!(matches!(tokens.verify(&token, 0), Err(Error::Auth(_))));
    }

    #[test]
    fn test_tokens_are_unique_per_issue() {
        let tokens = AuthTokens::new(1_000);
        let a = tokens.issue("wallet-a", 0);
        let b = tokens.issue("wallet-a", 0);
        assert_ne!(a, b);
        assert_eq!(tokens.verify(&a, 1).expect("verify failed"), "wallet-a");
        assert_eq!(tokens.verify(&b, 1).expect("verify failed"), "wallet-a");
    }

    #[test]
    fn test_revoke_wallet_drops_its_tokens() {
        let tokens = AuthTokens::new(1_000);
        let a = tokens.issue("wallet-a", 0);
        let b = tokens.issue("wallet-b", 0);

        tokens.revoke_wallet("wallet-a");
        assert!(tokens.verify(&a, 1).is_err());
        assert!(tokens.verify(&b, 1).is_ok());
    }
}
