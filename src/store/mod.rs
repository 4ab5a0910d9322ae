//! Credential store boundary.
//!
//! Accounts are persisted as whole documents (profile, password hash, role,
//! session list, pending reset token). Every save is a compare-and-swap on
//! [`Account::version`], which is what gives refresh-token rotation its
//! single-use guarantee under concurrent requests.

pub mod memory;
pub mod postgres;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Account, Role};

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("an account with email '{0}' already exists")]
    Conflict(String),
    #[error("account was modified concurrently")]
    StaleWrite,
    #[error("account {0} does not exist")]
    Missing(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt account record: {0}")]
    Corrupt(String),
}

#[rocket::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>>;

    /// Account whose session list contains `session_id`.
    async fn find_by_session(&self, session_id: Uuid) -> StoreResult<Option<Account>>;

    /// Account holding a reset token with this digest that expires after `now`.
    async fn find_by_live_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Account>>;

    /// Create a new account. Fails with [`StoreError::Conflict`] on a taken email.
    async fn insert(&self, account: &Account) -> StoreResult<()>;

    /// Persist `account` if its version still matches the stored one, then bump
    /// the version on both sides. Fails with [`StoreError::StaleWrite`] otherwise.
    async fn save(&self, account: &mut Account) -> StoreResult<()>;

    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    /// Accounts ordered by creation time.
    async fn list(&self, offset: i64, limit: i64) -> StoreResult<Vec<Account>>;

    async fn count(&self) -> StoreResult<i64>;

    async fn role_counts(&self) -> StoreResult<Vec<(Role, i64)>>;
}

/// Which store implementation to build at ignition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    pub fn from_env() -> Self {
        match std::env::var("ESTATE_STORE")
            .map(|value| value.trim().to_ascii_lowercase())
            .as_deref()
        {
            Ok("memory") => StoreBackend::Memory,
            _ => StoreBackend::Postgres,
        }
    }
}

const MAX_WRITE_ATTEMPTS: usize = 5;

/// Load, mutate and save an account, retrying on concurrent modification.
///
/// `apply` runs against a freshly loaded copy on every attempt, so any checks
/// it performs always see the latest stored state.
pub async fn update_account<S, F, R, E>(store: &S, id: Uuid, mut apply: F) -> Result<R, E>
where
    S: CredentialStore + ?Sized,
    F: FnMut(&mut Account) -> Result<R, E>,
    E: From<StoreError>,
{
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let mut account = store
            .find_by_id(id)
            .await?
            .ok_or(StoreError::Missing(id))?;
        let output = apply(&mut account)?;
        match store.save(&mut account).await {
            Ok(()) => return Ok(output),
            Err(StoreError::StaleWrite) => {
                log::debug!(
                    "store: stale write on account {} (attempt {} of {})",
                    id,
                    attempt,
                    MAX_WRITE_ATTEMPTS
                );
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(StoreError::StaleWrite.into())
}
