//! Authentication
//!
//! Exchanges credentials for a REST session token, or uses a pre-issued
//! token supplied by the caller.

use super::http::SvcHttpClient;
use anyhow::{Context, Result};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use url::Url;

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Session tokens expire after an hour of inactivity on the appliance
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// How the client proves its identity
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Password { username: String, password: String },
    Token(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Security: never print secrets
        match self {
            Credentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credentials::Token(_) => f.debug_tuple("Token").field(&"***").finish(),
        }
    }
}

/// Credentials holder with token caching
#[derive(Clone)]
pub struct SvcCredentials {
    credentials: Credentials,
    auth_url: Url,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl SvcCredentials {
    pub fn new(credentials: Credentials, auth_url: Url) -> Self {
        Self {
            credentials,
            auth_url,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get a session token for API calls, authenticating on first use
    pub async fn get_token(&self, http: &SvcHttpClient) -> Result<String> {
        let (username, password) = match &self.credentials {
            Credentials::Token(token) => return Ok(token.clone()),
            Credentials::Password { username, password } => (username, password),
        };

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, authenticating again");
            }
        }

        let token = http
            .authenticate(&self.auth_url, username, password)
            .await
            .context("Failed to obtain a session token")?;

        let expires_at = Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER;

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                expires_at,
            });
        }

        tracing::debug!("Session token cached for user {}", username);

        Ok(token)
    }
}
