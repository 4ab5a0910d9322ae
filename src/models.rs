use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ===== Response Envelope =====

/// Uniform response envelope shared by every route.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }
}

// ===== Roles =====

/// Permission tier. Variant order is the tier order.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Broker,
    Admin,
    Owner,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Broker, Role::Admin, Role::Owner];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Broker => "broker",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// True when `self` sits at or above `required` in the tier ordering.
    pub fn at_least(self, required: Role) -> bool {
        self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "broker" => Ok(Role::Broker),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            _ => Err(UnknownRole(value.to_string())),
        }
    }
}

// ===== Account Document =====

/// One authenticated device binding. Only the digest of the refresh secret is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSession {
    pub id: Uuid,
    pub token_hash: String,
    pub device: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshSession {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Pending password reset. At most one per account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetToken {
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Persisted identity record. Owns its session list and pending reset token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub sessions: Vec<RefreshSession>,
    pub reset_token: Option<ResetToken>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter; bumped by every successful save.
    pub version: i64,
}

impl Account {
    pub fn new(
        username: impl Into<String>,
        email: &str,
        password_hash: Option<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: normalize_email(email),
            password_hash,
            role,
            sessions: Vec::new(),
            reset_token: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Append a session, dropping expired entries and evicting the oldest
    /// live sessions beyond `max_sessions`.
    pub fn add_session(&mut self, session: RefreshSession, now: DateTime<Utc>, max_sessions: usize) {
        self.sessions.retain(|existing| existing.is_live(now));
        self.sessions.push(session);
        let cap = max_sessions.max(1);
        if self.sessions.len() > cap {
            self.sessions.sort_by_key(|existing| existing.created_at);
            let overflow = self.sessions.len() - cap;
            self.sessions.drain(..overflow);
        }
    }

    pub fn session(&self, session_id: Uuid) -> Option<&RefreshSession> {
        self.sessions.iter().find(|session| session.id == session_id)
    }

    pub fn session_mut(&mut self, session_id: Uuid) -> Option<&mut RefreshSession> {
        self.sessions.iter_mut().find(|session| session.id == session_id)
    }

    pub fn remove_session(&mut self, session_id: Uuid) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|session| session.id != session_id);
        self.sessions.len() != before
    }

    /// Clear every session, returning how many were dropped.
    pub fn revoke_all_sessions(&mut self) -> usize {
        let count = self.sessions.len();
        self.sessions.clear();
        count
    }

    pub fn live_sessions(&self, now: DateTime<Utc>) -> impl Iterator<Item = &RefreshSession> {
        self.sessions.iter().filter(move |session| session.is_live(now))
    }

    pub fn profile(&self) -> AccountProfile {
        AccountProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ===== Public Projections =====

/// Account projection safe to return to clients: no hash, no session secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub device: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&RefreshSession> for SessionView {
    fn from(session: &RefreshSession) -> Self {
        Self {
            id: session.id,
            device: session.device.clone(),
            user_agent: session.user_agent.clone(),
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}
