//! Auth controller logic: account lifecycle on top of the credential store,
//! password service and token service. Route handlers stay thin wrappers.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::jwt::VerifiedIdentity;
use crate::auth::passwords::PasswordService;
use crate::auth::requests::{CreateAdminRequest, LoginRequest, RegisterRequest};
use crate::auth::reset::ResetService;
use crate::auth::responses::{CreatedAdmin, RoleCount, UserPage, UserStats};
use crate::auth::tokens::{DeviceMeta, TokenPair, TokenService};
use crate::auth::{AuthConfig, AuthError, AuthResult};
use crate::mailer::ResetPurpose;
use crate::models::{Account, AccountProfile, Role, SessionView, normalize_email};
use crate::store::{CredentialStore, update_account};
use crate::validation::FieldError;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    passwords: Arc<PasswordService>,
    tokens: Arc<TokenService>,
    resets: Arc<ResetService>,
    admin_setup_ttl: Duration,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        passwords: Arc<PasswordService>,
        tokens: Arc<TokenService>,
        resets: Arc<ResetService>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            store,
            passwords,
            tokens,
            resets,
            admin_setup_ttl: Duration::seconds(config.admin_setup_ttl_secs),
        }
    }

    pub async fn register(
        &self,
        request: RegisterRequest,
        meta: DeviceMeta,
    ) -> AuthResult<(AccountProfile, TokenPair)> {
        let email = normalize_email(&request.email);
        if self.store.find_by_email(&email).await?.is_some() {
            return Err(AuthError::Conflict(
                "an account with this email already exists".into(),
            ));
        }

        let hash = self.passwords.hash_password(&request.password)?;
        let account = Account::new(
            request.username.trim(),
            &email,
            Some(hash),
            Role::User,
            Utc::now(),
        );
        self.store.insert(&account).await?;
        log::info!("auth: registered account {}", account.id);

        let pair = self
            .tokens
            .issue_token_pair(account.id, account.role, with_device(meta, request.device))
            .await?;
        Ok((account.profile(), pair))
    }

    /// Unknown email and wrong password fail identically.
    pub async fn login(
        &self,
        request: LoginRequest,
        meta: DeviceMeta,
    ) -> AuthResult<(AccountProfile, TokenPair)> {
        let email = normalize_email(&request.email);
        let account = self.store.find_by_email(&email).await?;
        let stored_hash = account
            .as_ref()
            .and_then(|account| account.password_hash.as_deref());
        let verified = self
            .passwords
            .verify_optional(&request.password, stored_hash)?;

        let account = match account {
            Some(account) if verified => account,
            _ => return Err(AuthError::InvalidCredentials),
        };

        let pair = self
            .tokens
            .issue_token_pair(account.id, account.role, with_device(meta, request.device))
            .await?;
        Ok((account.profile(), pair))
    }

    /// Revoke the presented session, or every session when `all_devices` is set.
    pub async fn logout(
        &self,
        caller: &VerifiedIdentity,
        refresh_token: Option<&str>,
        all_devices: bool,
    ) -> AuthResult<usize> {
        if all_devices {
            return self.tokens.revoke_all_sessions(caller.account_id).await;
        }
        let token = refresh_token.ok_or_else(|| {
            AuthError::Validation(vec![FieldError::new("refreshToken", "is required")])
        })?;
        self.tokens.revoke_session(caller.account_id, token).await?;
        Ok(1)
    }

    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        self.tokens.rotate_refresh_token(refresh_token).await
    }

    pub async fn profile(&self, account_id: Uuid) -> AuthResult<AccountProfile> {
        Ok(self.load(account_id).await?.profile())
    }

    pub async fn update_profile(
        &self,
        account_id: Uuid,
        username: &str,
    ) -> AuthResult<AccountProfile> {
        let username = username.trim().to_string();
        update_account(self.store.as_ref(), account_id, |account| {
            account.username = username.clone();
            Ok::<_, AuthError>(account.profile())
        })
        .await
    }

    pub async fn list_sessions(&self, account_id: Uuid) -> AuthResult<Vec<SessionView>> {
        self.tokens.list_sessions(account_id).await
    }

    pub async fn revoke_session_by_id(&self, account_id: Uuid, session_id: Uuid) -> AuthResult<()> {
        self.tokens.revoke_session_by_id(account_id, session_id).await
    }

    /// Provision an admin without a password and mail an account-setup token.
    pub async fn create_admin(
        &self,
        caller: &VerifiedIdentity,
        request: CreateAdminRequest,
    ) -> AuthResult<CreatedAdmin> {
        if caller.role != Role::Owner {
            return Err(AuthError::Forbidden);
        }
        let account = Account::new(
            request.username.trim(),
            &request.email,
            None,
            Role::Admin,
            Utc::now(),
        );
        self.store.insert(&account).await?;
        log::info!(
            "auth: owner {} created admin account {}",
            caller.account_id,
            account.id
        );

        let issued = self
            .resets
            .issue_token(account.id, ResetPurpose::AccountSetup, self.admin_setup_ttl)
            .await?;
        Ok(CreatedAdmin {
            user: self.profile(account.id).await?,
            setup_token_expires_at: issued.expires_at,
        })
    }

    pub async fn update_user_role(
        &self,
        caller: &VerifiedIdentity,
        target_id: Uuid,
        new_role: Role,
    ) -> AuthResult<AccountProfile> {
        if caller.account_id == target_id {
            return Err(AuthError::Forbidden);
        }
        let caller_role = caller.role;
        update_account(self.store.as_ref(), target_id, |account| {
            if !may_assign_role(caller_role, account.role, new_role) {
                return Err(AuthError::Forbidden);
            }
            account.role = new_role;
            Ok(())
        })
        .await?;
        log::info!(
            "auth: account {} set role of {} to {}",
            caller.account_id,
            target_id,
            new_role
        );
        self.profile(target_id).await
    }

    pub async fn delete_user(&self, caller: &VerifiedIdentity, target_id: Uuid) -> AuthResult<()> {
        if caller.account_id == target_id {
            return Err(AuthError::Forbidden);
        }
        let target = self.load(target_id).await?;
        if target.role >= Role::Admin && caller.role != Role::Owner {
            return Err(AuthError::Forbidden);
        }
        if !self.store.delete(target_id).await? {
            return Err(AuthError::NotFound("account not found".into()));
        }
        log::info!(
            "auth: account {} deleted account {} ({} session(s) dropped)",
            caller.account_id,
            target_id,
            target.sessions.len()
        );
        Ok(())
    }

    pub async fn get_user(&self, account_id: Uuid) -> AuthResult<AccountProfile> {
        self.profile(account_id).await
    }

    pub async fn list_users(&self, page: Option<i64>, limit: Option<i64>) -> AuthResult<UserPage> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1).saturating_mul(limit);

        let total = self.store.count().await?;
        let users = self
            .store
            .list(offset, limit)
            .await?
            .iter()
            .map(Account::profile)
            .collect();
        let total_pages = if total == 0 { 0 } else { (total + limit - 1) / limit };

        Ok(UserPage {
            users,
            page,
            limit,
            total,
            total_pages,
        })
    }

    pub async fn stats(&self) -> AuthResult<UserStats> {
        let total_users = self.store.count().await?;
        let counts = self.store.role_counts().await?;
        let by_role = Role::ALL
            .iter()
            .map(|role| RoleCount {
                role: *role,
                count: counts
                    .iter()
                    .find(|(counted, _)| counted == role)
                    .map(|(_, count)| *count)
                    .unwrap_or(0),
            })
            .collect();
        Ok(UserStats {
            total_users,
            by_role,
        })
    }

    async fn load(&self, account_id: Uuid) -> AuthResult<Account> {
        self.store
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("account not found".into()))
    }
}

/// Owners may assign any role to anyone else. Admins may only move accounts
/// below admin between user and broker.
pub fn may_assign_role(caller: Role, current: Role, requested: Role) -> bool {
    match caller {
        Role::Owner => true,
        Role::Admin => current < Role::Admin && requested < Role::Admin,
        Role::User | Role::Broker => false,
    }
}

fn with_device(meta: DeviceMeta, device: Option<String>) -> DeviceMeta {
    match device.filter(|label| !label.trim().is_empty()) {
        Some(label) => DeviceMeta {
            device: Some(label),
            ..meta
        },
        None => meta,
    }
}
