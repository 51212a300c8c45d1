use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use chrono::{DateTime, Utc};
use epay_common::Secret;
use log::*;
use tokio::time::Instant;

use crate::{
    data_objects::{TokenResponse, MAX_TOKEN_LIFETIME_SECS},
    EpayApiError,
};

/// A bearer token issued by the processor's OAuth server. Tokens are immutable; a refresh produces a new `Token`
/// that replaces the old one in the [`TokenStore`].
#[derive(Debug, Clone)]
pub struct Token {
    access_token: Secret<String>,
    token_type: String,
    scope: String,
    refresh_token: Secret<String>,
    issued_at: DateTime<Utc>,
    expires_in: Duration,
    expires_at: Instant,
}

impl Token {
    /// Lifetimes beyond [`MAX_TOKEN_LIFETIME_SECS`] are capped. A deadline the clock cannot represent leaves the token
    /// already expired.
    pub fn from_response(response: TokenResponse) -> Self {
        let expires_in = Duration::from_secs(response.expires_in.min(MAX_TOKEN_LIFETIME_SECS));
        let now = Instant::now();
        Self {
            access_token: Secret::new(response.access_token),
            token_type: response.token_type,
            scope: response.scope,
            refresh_token: Secret::new(response.refresh_token),
            issued_at: Utc::now(),
            expires_in,
            expires_at: now.checked_add(expires_in).unwrap_or(now),
        }
    }

    pub fn access_token(&self) -> &Secret<String> {
        &self.access_token
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn refresh_token(&self) -> &Secret<String> {
        &self.refresh_token
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// The lifetime the OAuth server granted this token.
    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// The value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.reveal())
    }
}

/// Holds the adapter's current token. Readers get a shared snapshot; the refresher swaps in whole new tokens, so a
/// snapshot is never a mix of two tokens. The lock is only held for the pointer copy, never across I/O.
#[derive(Clone, Default)]
pub struct TokenStore {
    current: Arc<RwLock<Option<Arc<Token>>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently installed token, expired or not. `None` until the first refresh succeeds.
    pub fn snapshot(&self) -> Option<Arc<Token>> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone()
    }

    /// The current token, provided it has not expired yet.
    pub fn valid_token(&self) -> Result<Arc<Token>, EpayApiError> {
        match self.snapshot() {
            Some(token) if !token.is_expired() => Ok(token),
            Some(_) => Err(EpayApiError::TokenUnavailable(
                "The access token has expired and has not been refreshed yet".to_string(),
            )),
            None => Err(EpayApiError::TokenUnavailable("No access token has been issued yet".to_string())),
        }
    }

    /// Atomically installs a new token, returning the one it replaced.
    pub fn replace(&self, token: Token) -> Option<Arc<Token>> {
        let token = Arc::new(token);
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        trace!("🔑️ Installing new access token. Expires in {}s", token.expires_in().as_secs());
        guard.replace(token)
    }
}
