//! Access/refresh token issuance and the per-account session list.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::auth::jwt::{JwtService, VerifiedIdentity};
use crate::auth::secrets::{self, ParsedRefreshToken};
use crate::auth::{AuthConfig, AuthError, AuthResult};
use crate::models::{RefreshSession, Role, SessionView};
use crate::store::{CredentialStore, update_account};

/// Client metadata recorded alongside a refresh session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceMeta {
    pub device: Option<String>,
    pub user_agent: Option<String>,
}

impl DeviceMeta {
    pub fn new(device: Option<String>, user_agent: Option<String>) -> Self {
        Self { device, user_agent }
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
    pub session_id: Uuid,
}

enum Rotation {
    Rotated {
        secret: String,
        role: Role,
        expires_at: DateTime<Utc>,
    },
    Reused,
    Expired,
}

pub struct TokenService {
    store: Arc<dyn CredentialStore>,
    jwt: Arc<JwtService>,
    refresh_ttl: Duration,
    max_sessions: usize,
}

impl TokenService {
    pub fn new(store: Arc<dyn CredentialStore>, jwt: Arc<JwtService>, config: &AuthConfig) -> Self {
        Self {
            store,
            jwt,
            refresh_ttl: Duration::seconds(config.refresh_token_ttl_secs),
            max_sessions: config.max_sessions,
        }
    }

    /// Mint an access token and a new refresh session for the account.
    pub async fn issue_token_pair(
        &self,
        account_id: Uuid,
        role: Role,
        meta: DeviceMeta,
    ) -> AuthResult<TokenPair> {
        let now = Utc::now();
        let minted = secrets::mint_refresh_secret();
        let session = RefreshSession {
            id: Uuid::new_v4(),
            token_hash: minted.stored_hash,
            device: meta.device,
            user_agent: meta.user_agent,
            created_at: now,
            expires_at: now + self.refresh_ttl,
        };
        let session_id = session.id;
        let refresh_expires_at = session.expires_at;
        let max_sessions = self.max_sessions;

        update_account(self.store.as_ref(), account_id, |account| {
            account.add_session(session.clone(), now, max_sessions);
            Ok::<_, AuthError>(())
        })
        .await?;

        let access = self.jwt.issue_access_token(account_id, role)?;
        Ok(TokenPair {
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token: secrets::refresh_token_string(session_id, &minted.secret),
            refresh_expires_at,
            session_id,
        })
    }

    pub fn verify_access_token(&self, token: &str) -> AuthResult<VerifiedIdentity> {
        self.jwt.verify(token)
    }

    /// Exchange a refresh token for a new pair. The presented token stops working
    /// in the same write that stores its replacement.
    pub async fn rotate_refresh_token(&self, token: &str) -> AuthResult<TokenPair> {
        let parsed = ParsedRefreshToken::parse(token)?;
        let account = self
            .store
            .find_by_session(parsed.session_id)
            .await?
            .ok_or(AuthError::TokenInvalid)?;
        let account_id = account.id;
        let refresh_ttl = self.refresh_ttl;

        let outcome = update_account(self.store.as_ref(), account_id, |account| {
            let now = Utc::now();
            let Some(session) = account.session_mut(parsed.session_id) else {
                return Err(AuthError::TokenInvalid);
            };
            if !secrets::verify_refresh_secret(&parsed.secret, &session.token_hash) {
                account.remove_session(parsed.session_id);
                return Ok(Rotation::Reused);
            }
            if !session.is_live(now) {
                account.remove_session(parsed.session_id);
                return Ok(Rotation::Expired);
            }
            let minted = secrets::mint_refresh_secret();
            session.token_hash = minted.stored_hash;
            session.expires_at = now + refresh_ttl;
            let expires_at = session.expires_at;
            Ok(Rotation::Rotated {
                secret: minted.secret,
                role: account.role,
                expires_at,
            })
        })
        .await;

        match outcome {
            Ok(Rotation::Rotated {
                secret,
                role,
                expires_at,
            }) => {
                let access = self.jwt.issue_access_token(account_id, role)?;
                Ok(TokenPair {
                    access_token: access.token,
                    access_expires_at: access.expires_at,
                    refresh_token: secrets::refresh_token_string(parsed.session_id, &secret),
                    refresh_expires_at: expires_at,
                    session_id: parsed.session_id,
                })
            }
            Ok(Rotation::Reused) => {
                log::warn!(
                    "auth: refresh token reuse on account {} session {}; session revoked",
                    account_id,
                    parsed.session_id
                );
                Err(AuthError::TokenReused)
            }
            Ok(Rotation::Expired) => Err(AuthError::TokenExpired),
            // The account vanished between lookup and write.
            Err(AuthError::NotFound(_)) => Err(AuthError::TokenInvalid),
            Err(err) => Err(err),
        }
    }

    /// Remove the one session matching `token`, provided it belongs to `account_id`.
    pub async fn revoke_session(&self, account_id: Uuid, token: &str) -> AuthResult<()> {
        let parsed = ParsedRefreshToken::parse(token)?;
        update_account(self.store.as_ref(), account_id, |account| {
            let matches = account
                .session(parsed.session_id)
                .map(|session| secrets::verify_refresh_secret(&parsed.secret, &session.token_hash))
                .unwrap_or(false);
            if !matches {
                return Err(AuthError::TokenInvalid);
            }
            account.remove_session(parsed.session_id);
            Ok(())
        })
        .await
    }

    pub async fn revoke_session_by_id(&self, account_id: Uuid, session_id: Uuid) -> AuthResult<()> {
        update_account(self.store.as_ref(), account_id, |account| {
            if account.remove_session(session_id) {
                Ok(())
            } else {
                Err(AuthError::NotFound("session not found".into()))
            }
        })
        .await
    }

    /// Clear every session on the account. Returns how many were removed.
    pub async fn revoke_all_sessions(&self, account_id: Uuid) -> AuthResult<usize> {
        update_account(self.store.as_ref(), account_id, |account| {
            Ok::<_, AuthError>(account.revoke_all_sessions())
        })
        .await
    }

    /// Live sessions only; expired entries stay in storage until the next write.
    pub async fn list_sessions(&self, account_id: Uuid) -> AuthResult<Vec<SessionView>> {
        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("account not found".into()))?;
        let now = Utc::now();
        Ok(account.live_sessions(now).map(SessionView::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Account;
    use crate::store::MemoryCredentialStore;

    struct Harness {
        store: Arc<MemoryCredentialStore>,
        tokens: Arc<TokenService>,
        account_id: Uuid,
    }

    async fn harness() -> Harness {
        let config = AuthConfig::for_tests();
        let store = Arc::new(MemoryCredentialStore::new());
        let jwt = Arc::new(JwtService::from_config(&config).expect("jwt"));
        let tokens = Arc::new(TokenService::new(store.clone(), jwt, &config));
        let account = Account::new("alice", "alice@example.com", None, Role::User, Utc::now());
        store.insert(&account).await.expect("insert");
        Harness {
            store,
            tokens,
            account_id: account.id,
        }
    }

    fn laptop() -> DeviceMeta {
        DeviceMeta::new(Some("laptop".into()), Some("test-agent".into()))
    }

    #[tokio::test]
    async fn issued_pair_is_recorded_as_a_session() {
        let h = harness().await;
        let pair = h
            .tokens
            .issue_token_pair(h.account_id, Role::User, laptop())
            .await
            .expect("issue");

        let identity = h.tokens.verify_access_token(&pair.access_token).expect("verify");
        assert_eq!(identity.account_id, h.account_id);
        assert_eq!(identity.role, Role::User);

        let sessions = h.tokens.list_sessions(h.account_id).await.expect("list");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].device.as_deref(), Some("laptop"));
        assert_eq!(sessions[0].user_agent.as_deref(), Some("test-agent"));
    }

    #[tokio::test]
    async fn rotation_is_single_use() {
        let h = harness().await;
        let first = h
            .tokens
            .issue_token_pair(h.account_id, Role::User, laptop())
            .await
            .expect("issue");

        let second = h
            .tokens
            .rotate_refresh_token(&first.refresh_token)
            .await
            .expect("rotate");
        assert_ne!(second.refresh_token, first.refresh_token);
        assert_eq!(second.session_id, first.session_id);

        let replay = h.tokens.rotate_refresh_token(&first.refresh_token).await;
        assert!(matches!(replay, Err(AuthError::TokenReused)));

        // Reuse revokes the session, so the newer token is dead too.
        let after = h.tokens.rotate_refresh_token(&second.refresh_token).await;
        assert!(matches!(after, Err(AuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn concurrent_rotation_has_exactly_one_winner() {
        let h = harness().await;
        let pair = h
            .tokens
            .issue_token_pair(h.account_id, Role::User, laptop())
            .await
            .expect("issue");

        let mut handles = Vec::new();
        for _ in 0..2 {
            let tokens = h.tokens.clone();
            let token = pair.refresh_token.clone();
            handles.push(tokio::spawn(
                async move { tokens.rotate_refresh_token(&token).await },
            ));
        }

        let mut successes = 0;
        let mut failures = 0;
        for handle in handles {
            match handle.await.expect("join") {
                Ok(_) => successes += 1,
                Err(AuthError::TokenReused) | Err(AuthError::TokenInvalid) => failures += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn unknown_and_malformed_tokens_are_invalid() {
        let h = harness().await;
        let forged = secrets::refresh_token_string(Uuid::new_v4(), "secret");
        assert!(matches!(
            h.tokens.rotate_refresh_token(&forged).await,
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            h.tokens.rotate_refresh_token("garbage").await,
            Err(AuthError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn expired_sessions_fail_rotation_and_are_hidden() {
        let h = harness().await;
        let pair = h
            .tokens
            .issue_token_pair(h.account_id, Role::User, laptop())
            .await
            .expect("issue");

        let mut account = h.store.find_by_id(h.account_id).await.unwrap().unwrap();
        account.sessions[0].expires_at = Utc::now() - Duration::seconds(1);
        h.store.save(&mut account).await.expect("save");

        assert!(h.tokens.list_sessions(h.account_id).await.unwrap().is_empty());
        assert!(matches!(
            h.tokens.rotate_refresh_token(&pair.refresh_token).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn revoke_session_removes_only_that_device() {
        let h = harness().await;
        let laptop_pair = h
            .tokens
            .issue_token_pair(h.account_id, Role::User, laptop())
            .await
            .expect("issue");
        let phone_pair = h
            .tokens
            .issue_token_pair(
                h.account_id,
                Role::User,
                DeviceMeta::new(Some("phone".into()), None),
            )
            .await
            .expect("issue");

        h.tokens
            .revoke_session(h.account_id, &laptop_pair.refresh_token)
            .await
            .expect("revoke");

        let sessions = h.tokens.list_sessions(h.account_id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, phone_pair.session_id);
        assert!(
            h.tokens
                .rotate_refresh_token(&laptop_pair.refresh_token)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn revoke_all_sessions_is_idempotent() {
        let h = harness().await;
        assert_eq!(h.tokens.revoke_all_sessions(h.account_id).await.unwrap(), 0);

        h.tokens
            .issue_token_pair(h.account_id, Role::User, laptop())
            .await
            .expect("issue");
        assert_eq!(h.tokens.revoke_all_sessions(h.account_id).await.unwrap(), 1);

        for _ in 0..3 {
            h.tokens
                .issue_token_pair(h.account_id, Role::User, DeviceMeta::default())
                .await
                .expect("issue");
        }
        assert_eq!(h.tokens.revoke_all_sessions(h.account_id).await.unwrap(), 3);
        assert_eq!(h.tokens.revoke_all_sessions(h.account_id).await.unwrap(), 0);
        assert!(h.tokens.list_sessions(h.account_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_cap_evicts_the_oldest() {
        let h = harness().await;
        let cap = AuthConfig::for_tests().max_sessions;
        let first = h
            .tokens
            .issue_token_pair(h.account_id, Role::User, laptop())
            .await
            .expect("issue");
        for _ in 0..cap {
            h.tokens
                .issue_token_pair(h.account_id, Role::User, DeviceMeta::default())
                .await
                .expect("issue");
        }
        let sessions = h.tokens.list_sessions(h.account_id).await.unwrap();
        assert_eq!(sessions.len(), cap);
        assert!(sessions.iter().all(|session| session.id != first.session_id));
    }
}
