//! Authentication module: configuration, credential handling, token minting,
//! Rocket request guards, and HTTP route handlers.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod guards;
pub mod jwt;
pub mod passwords;
pub mod requests;
pub mod reset;
pub mod responses;
pub mod routes;
pub mod secrets;
pub mod service;
pub mod tokens;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use guards::{AuthUser, RequireAdmin, RequireAuth, RequireBroker, RequireOwner};
pub use jwt::JwtService;
pub use passwords::PasswordService;
pub use reset::ResetService;
pub use service::AuthService;
pub use tokens::{DeviceMeta, TokenPair, TokenService};

use crate::mailer::Mailer;
use crate::store::CredentialStore;

/// Everything the auth routes need, built once at ignition and managed by Rocket.
#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub store: Arc<dyn CredentialStore>,
    pub mailer: Arc<dyn Mailer>,
    pub passwords: Arc<PasswordService>,
    pub tokens: Arc<TokenService>,
    pub resets: Arc<ResetService>,
    pub accounts: Arc<AuthService>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        mailer: Arc<dyn Mailer>,
    ) -> AuthResult<Self> {
        let passwords = Arc::new(PasswordService::new()?);
        let jwt = Arc::new(JwtService::from_config(&config)?);
        let tokens = Arc::new(TokenService::new(store.clone(), jwt, &config));
        let resets = Arc::new(ResetService::new(
            store.clone(),
            passwords.clone(),
            mailer.clone(),
            &config,
        ));
        let accounts = Arc::new(AuthService::new(
            store.clone(),
            passwords.clone(),
            tokens.clone(),
            resets.clone(),
            &config,
        ));

        Ok(Self {
            config,
            store,
            mailer,
            passwords,
            tokens,
            resets,
            accounts,
        })
    }
}
