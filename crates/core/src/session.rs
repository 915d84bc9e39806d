//! Auth context handed explicitly to every remote backend.
//! Created at login (or from config), cleared on logout/teardown.

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct AuthSession {
    token: Arc<RwLock<Option<StoredToken>>>,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session pre-filled with a token, e.g. from config. Blank tokens are ignored.
    pub fn with_token(token: impl Into<String>) -> Self {
        let token = token.into();
        let stored = if token.trim().is_empty() {
            None
        } else {
            Some(StoredToken {
                token,
                created_at: chrono::Utc::now(),
                expires_at: None,
            })
        };
        Self { token: Arc::new(RwLock::new(stored)) }
    }

    /// Store a token, replacing any previous one
    pub async fn install(&self, token: String, ttl: Option<chrono::Duration>) {
        let now = chrono::Utc::now();
        let stored = StoredToken {
            token,
            created_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
        };
        *self.token.write().await = Some(stored);
    }

    /// Current bearer token, dropping it if expired
    pub async fn bearer(&self) -> Option<String> {
        let mut guard = self.token.write().await;
        if let Some(stored) = guard.as_ref() {
            if let Some(expires) = stored.expires_at {
                if expires < chrono::Utc::now() {
                    debug!(%expires, "bearer token expired, dropping it");
                    *guard = None;
                    return None;
                }
            }
        }
        guard.as_ref().map(|stored| stored.token.clone())
    }

    pub async fn clear(&self) {
        *self.token.write().await = None;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.bearer().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_install_and_clear() {
        let session = AuthSession::new();
        assert!(!session.is_authenticated().await);

        session.install("abc".to_string(), None).await;
        assert_eq!(session.bearer().await.as_deref(), Some("abc"));

        let shared = session.clone();
        shared.clear().await;
        assert!(!session.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_expired_token_is_dropped() {
        let session = AuthSession::new();
        session.install("old".to_string(), Some(chrono::Duration::seconds(-1))).await;
        assert_eq!(session.bearer().await, None);
    }

    #[tokio::test]
    async fn test_blank_token_means_anonymous() {
        assert!(!AuthSession::with_token("  ").is_authenticated().await);
        assert!(AuthSession::with_token("t0k").is_authenticated().await);
    }
}
