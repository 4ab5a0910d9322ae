use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{CredentialStore, StoreError, StoreResult};
use crate::models::{Account, RefreshSession, ResetToken, Role};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const UNIQUE_VIOLATION: &str = "23505";

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, role, sessions, \
     reset_token_hash, reset_token_expires_at, created_at, updated_at, version";

/// Postgres-backed store: one row per account, sessions as a JSONB array.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> StoreResult<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    async fn fetch_optional(&self, query: AccountQuery<'_>) -> StoreResult<Option<Account>> {
        let row = query.fetch_optional(&self.pool).await?;
        row.map(Account::try_from).transpose()
    }
}

type AccountQuery<'q> =
    sqlx::query::QueryAs<'q, sqlx::Postgres, AccountRow, sqlx::postgres::PgArguments>;

fn select_where(clause: &str) -> String {
    format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE {clause} LIMIT 1")
}

#[derive(Debug, FromRow)]
struct AccountRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: Option<String>,
    role: String,
    sessions: Json<Vec<RefreshSession>>,
    reset_token_hash: Option<String>,
    reset_token_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;
        let reset_token = match (row.reset_token_hash, row.reset_token_expires_at) {
            (Some(token_hash), Some(expires_at)) => Some(ResetToken {
                token_hash,
                expires_at,
            }),
            _ => None,
        };
        Ok(Account {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role,
            sessions: row.sessions.0,
            reset_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

fn map_write_error(err: sqlx::Error, email: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err)
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
                && db_err.constraint() == Some("accounts_email_key") =>
        {
            StoreError::Conflict(email.to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[rocket::async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let sql = select_where("email = $1");
        let query = sqlx::query_as(&sql).bind(email.to_lowercase());
        self.fetch_optional(query).await
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        let sql = select_where("id = $1");
        self.fetch_optional(sqlx::query_as(&sql).bind(id)).await
    }

    async fn find_by_session(&self, session_id: Uuid) -> StoreResult<Option<Account>> {
        let sql = select_where("sessions @> $1");
        let probe = Json(json!([{ "id": session_id }]));
        self.fetch_optional(sqlx::query_as(&sql).bind(probe)).await
    }

    async fn find_by_live_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Account>> {
        let sql = select_where("reset_token_hash = $1 AND reset_token_expires_at > $2");
        let query = sqlx::query_as(&sql).bind(token_hash).bind(now);
        self.fetch_optional(query).await
    }

    async fn insert(&self, account: &Account) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, username, email, password_hash, role, sessions,
                                  reset_token_hash, reset_token_expires_at,
                                  created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(account.id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(Json(&account.sessions))
        .bind(account.reset_token.as_ref().map(|reset| reset.token_hash.clone()))
        .bind(account.reset_token.as_ref().map(|reset| reset.expires_at))
        .bind(account.created_at)
        .bind(account.updated_at)
        .bind(account.version)
        .execute(&self.pool)
        .await
        .map_err(|err| map_write_error(err, &account.email))?;
        Ok(())
    }

    async fn save(&self, account: &mut Account) -> StoreResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE accounts
               SET username = $3,
                   email = $4,
                   password_hash = $5,
                   role = $6,
                   sessions = $7,
                   reset_token_hash = $8,
                   reset_token_expires_at = $9,
                   updated_at = $10,
                   version = version + 1
             WHERE id = $1 AND version = $2
            "#,
        )
        .bind(account.id)
        .bind(account.version)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(Json(&account.sessions))
        .bind(account.reset_token.as_ref().map(|reset| reset.token_hash.clone()))
        .bind(account.reset_token.as_ref().map(|reset| reset.expires_at))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|err| map_write_error(err, &account.email))?;

        if result.rows_affected() == 1 {
            account.version += 1;
            account.updated_at = now;
            return Ok(());
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE id = $1)")
            .bind(account.id)
            .fetch_one(&self.pool)
            .await?;
        if exists {
            Err(StoreError::StaleWrite)
        } else {
            Err(StoreError::Missing(account.id))
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, offset: i64, limit: i64) -> StoreResult<Vec<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY created_at, id OFFSET $1 LIMIT $2"
        );
        let rows = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(offset.max(0))
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Account::try_from).collect()
    }

    async fn count(&self) -> StoreResult<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn role_counts(&self) -> StoreResult<Vec<(Role, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM accounts GROUP BY role")
                .fetch_all(&self.pool)
                .await?;
        let mut counts = rows
            .into_iter()
            .map(|(role, count)| {
                role.parse::<Role>()
                    .map(|role| (role, count))
                    .map_err(|err| StoreError::Corrupt(err.to_string()))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        counts.sort_by_key(|(role, _)| *role);
        Ok(counts)
    }
}
