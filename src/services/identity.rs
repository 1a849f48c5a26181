//! src/services/identity.rs
//!
//! Identity: sign-in against provisioned accounts, bearer-token session
//! resolution, and sign-out via revocation. Tokens are HS256 JWTs whose
//! claims carry the account's permission bits. A configured set of
//! pre-issued static tokens is accepted as-is with full access, standing
//! in for machine callers.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::{RwLock, watch};

use crate::config::AccountConfig;
use crate::models::user::{Claims, MODE_READ_WRITE, UserInfo};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("login required")]
    Unauthorized,
    #[error(transparent)]
    Token(#[from] jsonwebtoken::errors::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// A successful sign-in: the issued token plus the resolved user.
#[derive(Debug, Clone, Serialize)]
pub struct SignedInUser {
    pub token: String,
    pub user: UserInfo,
}

/// Session management for the console.
#[async_trait]
pub trait Identity: Send + Sync {
    /// Exchange credentials for a session token.
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<SignedInUser>;

    /// Invalidate a session token.
    async fn sign_out(&self, token: &str) -> AuthResult<()>;

    /// Resolve a bearer token to its user, rejecting revoked or expired
    /// tokens.
    async fn current_user(&self, token: &str) -> AuthResult<UserInfo>;

    /// Subscribe to sign-in state changes. Receivers observe the most
    /// recent session event immediately.
    fn watch(&self) -> watch::Receiver<Option<UserInfo>>;
}

/// [`Identity`] backed by accounts from configuration.
pub struct LocalIdentity {
    accounts: Vec<AccountConfig>,
    static_tokens: HashSet<String>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: ChronoDuration,
    revoked: RwLock<HashSet<String>>,
    sessions: watch::Sender<Option<UserInfo>>,
}

impl LocalIdentity {
    pub fn new(
        secret: &str,
        accounts: Vec<AccountConfig>,
        static_tokens: Vec<String>,
        ttl_minutes: i64,
    ) -> Self {
        let (sessions, _) = watch::channel(None);
        Self {
            accounts,
            static_tokens: static_tokens.into_iter().collect(),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: ChronoDuration::minutes(ttl_minutes),
            revoked: RwLock::new(HashSet::new()),
            sessions,
        }
    }
}

#[async_trait]
impl Identity for LocalIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<SignedInUser> {
        let account = self
            .accounts
            .iter()
            .find(|a| a.email == email && a.password == password)
            .ok_or(AuthError::InvalidCredentials)?;

        let exp = (Utc::now() + self.ttl).timestamp() as usize;
        let claims = Claims {
            sub: account.email.clone(),
            mode: account.mode,
            exp,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        let user = claims.user();
        self.sessions.send_replace(Some(user.clone()));
        Ok(SignedInUser { token, user })
    }

    async fn sign_out(&self, token: &str) -> AuthResult<()> {
        // Static tokens are pre-issued and cannot be revoked.
        if !self.static_tokens.contains(token) {
            self.revoked.write().await.insert(token.to_string());
        }
        self.sessions.send_replace(None);
        Ok(())
    }

    async fn current_user(&self, token: &str) -> AuthResult<UserInfo> {
        if self.static_tokens.contains(token) {
            return Ok(UserInfo {
                email: "service@local".to_string(),
                mode: MODE_READ_WRITE,
            });
        }
        if self.revoked.read().await.contains(token) {
            return Err(AuthError::Unauthorized);
        }
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| AuthError::Unauthorized)?;
        Ok(data.claims.user())
    }

    fn watch(&self) -> watch::Receiver<Option<UserInfo>> {
        self.sessions.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::MODE_READ;

    fn identity(ttl_minutes: i64) -> LocalIdentity {
        LocalIdentity::new(
            "test-secret",
            vec![
                AccountConfig {
                    email: "editor@local".into(),
                    password: "pw".into(),
                    mode: MODE_READ_WRITE,
                },
                AccountConfig {
                    email: "viewer@local".into(),
                    password: "pw".into(),
                    mode: MODE_READ,
                },
            ],
            vec!["svc-token".into()],
            ttl_minutes,
        )
    }

    #[tokio::test]
    async fn sign_in_round_trips_through_token() {
        let identity = identity(60);
        let signed = identity.sign_in("editor@local", "pw").await.unwrap();
        let user = identity.current_user(&signed.token).await.unwrap();
        assert_eq!(user.email, "editor@local");
        assert!(user.can_write());
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let identity = identity(60);
        let err = identity.sign_in("editor@local", "nope").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn read_only_accounts_carry_their_mode() {
        let identity = identity(60);
        let signed = identity.sign_in("viewer@local", "pw").await.unwrap();
        let user = identity.current_user(&signed.token).await.unwrap();
        assert!(user.can_read());
        assert!(!user.can_write());
    }

    #[tokio::test]
    async fn signed_out_tokens_stop_resolving() {
        let identity = identity(60);
        let signed = identity.sign_in("editor@local", "pw").await.unwrap();
        identity.sign_out(&signed.token).await.unwrap();
        let err = identity.current_user(&signed.token).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected() {
        let identity = identity(-5);
        let signed = identity.sign_in("editor@local", "pw").await.unwrap();
        let err = identity.current_user(&signed.token).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn static_tokens_resolve_with_full_access() {
        let identity = identity(60);
        let user = identity.current_user("svc-token").await.unwrap();
        assert!(user.can_write());
        assert!(identity.current_user("other-token").await.is_err());
    }

    #[tokio::test]
    async fn watchers_observe_session_changes() {
        let identity = identity(60);
        let rx = identity.watch();
        assert!(rx.borrow().is_none());
        let signed = identity.sign_in("editor@local", "pw").await.unwrap();
        assert_eq!(
            rx.borrow().as_ref().map(|u| u.email.clone()),
            Some("editor@local".to_string())
        );
        identity.sign_out(&signed.token).await.unwrap();
        assert!(rx.borrow().is_none());
    }
}
