//! Bearer tokens for the Drive REST API.
//!
//! [`TokenCache`] keeps the last token from a `gcp_auth` provider and only
//! goes back to the provider once the token is inside its refresh window.
//! Refreshes are serialized through a mutex so concurrent uploads trigger a
//! single provider call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};

/// Tokens closer than this to expiry are refreshed.
const REFRESH_WINDOW: Duration = Duration::from_secs(60);

/// Lifetime assumed when the provider reports an unrepresentable expiry.
const FALLBACK_LIFETIME: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for files created or opened by the service account.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Anything that can hand out a bearer token.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> StorageResult<String>;
}

/// Fixed token, used against local fakes.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> StorageResult<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone)]
struct Lease {
    token: String,
    deadline: Instant,
}

impl Lease {
    fn fresh_at(&self, now: Instant) -> bool {
        now + REFRESH_WINDOW < self.deadline
    }

    fn alive_at(&self, now: Instant) -> bool {
        now < self.deadline
    }
}

/// Caching wrapper around a `gcp_auth` provider.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    scopes: [&'static str; 1],
    lease: Mutex<Option<Lease>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>, scope: &'static str) -> Self {
        Self {
            provider,
            scopes: [scope],
            lease: Mutex::new(None),
        }
    }
}

/// Convert a provider expiry into a monotonic deadline.
fn deadline_for(expires_at: chrono::DateTime<Utc>) -> Instant {
    let remaining = expires_at - Utc::now();
    if remaining <= chrono::Duration::zero() {
        return Instant::now();
    }
    Instant::now() + remaining.to_std().unwrap_or(FALLBACK_LIFETIME)
}

#[async_trait]
impl AccessTokenSource for TokenCache {
    async fn access_token(&self) -> StorageResult<String> {
        let mut lease = self.lease.lock().await;
        let now = Instant::now();
        if let Some(current) = lease.as_ref().filter(|l| l.fresh_at(now)) {
            return Ok(current.token.clone());
        }

        match self.provider.token(&self.scopes).await {
            Ok(token) => {
                let renewed = Lease {
                    token: token.as_str().to_string(),
                    deadline: deadline_for(token.expires_at()),
                };
                debug!("Obtained new Drive access token");
                let value = renewed.token.clone();
                *lease = Some(renewed);
                Ok(value)
            }
            Err(e) => match lease.as_ref().filter(|l| l.alive_at(Instant::now())) {
                Some(stale) => {
                    warn!(error = %e, "Drive token refresh failed, reusing current token");
                    Ok(stale.token.clone())
                }
                None => Err(StorageError::auth(format!("Failed to obtain auth token: {}", e))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_windows() {
        let now = Instant::now();
        let lease = Lease {
            token: "t".into(),
            deadline: now + Duration::from_secs(30),
        };
        assert!(!lease.fresh_at(now));
        assert!(lease.alive_at(now));
        assert!(!lease.alive_at(now + Duration::from_secs(31)));
    }

    #[test]
    fn test_past_expiry_is_immediate() {
        let deadline = deadline_for(Utc::now() - chrono::Duration::minutes(1));
        assert!(deadline <= Instant::now());
    }

    #[test]
    fn test_future_expiry_is_honoured() {
        let deadline = deadline_for(Utc::now() + chrono::Duration::minutes(10));
        assert!(deadline > Instant::now() + Duration::from_secs(500));
    }

    #[test]
    fn test_drive_scope() {
        assert!(DRIVE_SCOPE.ends_with("drive.file"));
    }

    #[tokio::test]
    async fn test_static_token() {
        let source = StaticToken("abc".into());
        assert_eq!(source.access_token().await.unwrap(), "abc");
    }
}
