//! Password reset lifecycle: forgot, validate, reset.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::auth::passwords::PasswordService;
use crate::auth::responses::ResetTokenStatus;
use crate::auth::secrets;
use crate::auth::{AuthConfig, AuthError, AuthResult};
use crate::mailer::{Mailer, PasswordResetMail, ResetPurpose};
use crate::models::{ResetToken, normalize_email};
use crate::store::{CredentialStore, update_account};

/// A reset token handed to the mailer, with its expiry.
#[derive(Debug, Clone)]
pub struct IssuedResetToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct ResetService {
    store: Arc<dyn CredentialStore>,
    passwords: Arc<PasswordService>,
    mailer: Arc<dyn Mailer>,
    reset_ttl: Duration,
    reset_url: String,
}

impl ResetService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        passwords: Arc<PasswordService>,
        mailer: Arc<dyn Mailer>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            store,
            passwords,
            mailer,
            reset_ttl: Duration::seconds(config.reset_token_ttl_secs),
            reset_url: config.reset_url.clone(),
        }
    }

    /// Start a reset for `email`. Succeeds identically whether or not the
    /// account exists; mail delivery failures are only logged.
    pub async fn forgot(&self, email: &str) -> AuthResult<()> {
        let email = normalize_email(email);
        let Some(account) = self.store.find_by_email(&email).await? else {
            log::debug!("reset: forgot-password for unknown email");
            return Ok(());
        };

        let issued = self
            .issue_token(account.id, ResetPurpose::ForgotPassword, self.reset_ttl)
            .await?;
        log::info!(
            "reset: token issued for account {} (expires {})",
            account.id,
            issued.expires_at
        );
        Ok(())
    }

    /// Store a fresh token on the account, replacing any pending one, and queue
    /// the mail in the background.
    pub async fn issue_token(
        &self,
        account_id: Uuid,
        purpose: ResetPurpose,
        ttl: Duration,
    ) -> AuthResult<IssuedResetToken> {
        let token = secrets::generate_reset_token();
        let digest = secrets::reset_token_digest(&token);
        let expires_at = Utc::now() + ttl;

        let account = update_account(self.store.as_ref(), account_id, |account| {
            account.reset_token = Some(ResetToken {
                token_hash: digest.clone(),
                expires_at,
            });
            Ok::<_, AuthError>(account.clone())
        })
        .await?;

        let mail = PasswordResetMail {
            account_id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            reset_url: format!("{}?token={}", self.reset_url, token),
            token: token.clone(),
            purpose,
        };
        // Delivery runs detached so response time never depends on the relay.
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            if let Err(err) = mailer.send_password_reset(&mail).await {
                log::error!(
                    "reset: failed to deliver {:?} mail for account {}: {}",
                    mail.purpose,
                    mail.account_id,
                    err
                );
            }
        });

        Ok(IssuedResetToken { token, expires_at })
    }

    pub async fn validate_token(&self, token: &str) -> AuthResult<ResetTokenStatus> {
        let digest = secrets::reset_token_digest(token);
        let account = self
            .store
            .find_by_live_reset_token(&digest, Utc::now())
            .await?
            .ok_or(AuthError::ResetTokenInvalid)?;
        Ok(ResetTokenStatus {
            valid: true,
            email: account.email,
        })
    }

    /// Set a new password, consume the token and revoke every session, in one write.
    pub async fn reset(&self, token: &str, new_password: &str) -> AuthResult<usize> {
        let digest = secrets::reset_token_digest(token);
        let account = self
            .store
            .find_by_live_reset_token(&digest, Utc::now())
            .await?
            .ok_or(AuthError::ResetTokenInvalid)?;
        let password_hash = self.passwords.hash_password(new_password)?;

        let revoked = update_account(self.store.as_ref(), account.id, |account| {
            let still_live = account
                .reset_token
                .as_ref()
                .is_some_and(|reset| reset.token_hash == digest && reset.expires_at > Utc::now());
            if !still_live {
                return Err(AuthError::ResetTokenInvalid);
            }
            account.password_hash = Some(password_hash.clone());
            account.reset_token = None;
            Ok(account.revoke_all_sessions())
        })
        .await
        .map_err(|err| match err {
            AuthError::NotFound(_) => AuthError::ResetTokenInvalid,
            other => other,
        })?;

        log::info!(
            "reset: password changed for account {}; {} session(s) revoked",
            account.id,
            revoked
        );
        Ok(revoked)
    }
}
