use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{CredentialStore, StoreError, StoreResult};
use crate::models::{Account, Role};

/// In-process store with the same uniqueness and version semantics as Postgres.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    accounts: Arc<RwLock<HashMap<Uuid, Account>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn email_taken(accounts: &HashMap<Uuid, Account>, email: &str, except: Uuid) -> bool {
        accounts
            .values()
            .any(|existing| existing.id != except && existing.email == email)
    }
}

#[rocket::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let email = email.to_lowercase();
        Ok(self
            .accounts
            .read()
            .values()
            .find(|account| account.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.accounts.read().get(&id).cloned())
    }

    async fn find_by_session(&self, session_id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .values()
            .find(|account| account.session(session_id).is_some())
            .cloned())
    }

    async fn find_by_live_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .values()
            .find(|account| {
                account
                    .reset_token
                    .as_ref()
                    .is_some_and(|reset| reset.token_hash == token_hash && reset.expires_at > now)
            })
            .cloned())
    }

    async fn insert(&self, account: &Account) -> StoreResult<()> {
        let mut accounts = self.accounts.write();
        if Self::email_taken(&accounts, &account.email, account.id) {
            return Err(StoreError::Conflict(account.email.clone()));
        }
        if accounts.contains_key(&account.id) {
            return Err(StoreError::Corrupt(format!("duplicate account id {}", account.id)));
        }
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn save(&self, account: &mut Account) -> StoreResult<()> {
        let mut accounts = self.accounts.write();
        let stored_version = accounts
            .get(&account.id)
            .map(|stored| stored.version)
            .ok_or(StoreError::Missing(account.id))?;
        if stored_version != account.version {
            return Err(StoreError::StaleWrite);
        }
        if Self::email_taken(&accounts, &account.email, account.id) {
            return Err(StoreError::Conflict(account.email.clone()));
        }
        account.version += 1;
        account.updated_at = Utc::now();
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.accounts.write().remove(&id).is_some())
    }

    async fn list(&self, offset: i64, limit: i64) -> StoreResult<Vec<Account>> {
        let mut all: Vec<Account> = self.accounts.read().values().cloned().collect();
        all.sort_by_key(|account| (account.created_at, account.id));
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> StoreResult<i64> {
        Ok(self.accounts.read().len() as i64)
    }

    async fn role_counts(&self) -> StoreResult<Vec<(Role, i64)>> {
        let accounts = self.accounts.read();
        Ok(Role::ALL
            .iter()
            .map(|role| {
                let count = accounts.values().filter(|a| a.role == *role).count() as i64;
                (*role, count)
            })
            .filter(|(_, count)| *count > 0)
            .collect())
    }
}
