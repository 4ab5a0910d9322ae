use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::auth::tokens::TokenPair;
use crate::models::{AccountProfile, Role};

/// Tokens plus profile, returned by register and login.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
    /// Echo this in the CSRF header when refreshing via cookie.
    pub csrf_token: String,
    pub user: AccountProfile,
}

impl AuthResponse {
    pub fn new(pair: TokenPair, csrf_token: String, user: AccountProfile) -> Self {
        Self {
            access_token: pair.access_token,
            access_token_expires_at: pair.access_expires_at,
            refresh_token: pair.refresh_token,
            refresh_token_expires_at: pair.refresh_expires_at,
            csrf_token,
            user,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub csrf_token: String,
}

impl RefreshResponse {
    pub fn new(pair: TokenPair, csrf_token: String) -> Self {
        Self {
            access_token: pair.access_token,
            access_token_expires_at: pair.access_expires_at,
            refresh_token: pair.refresh_token,
            refresh_token_expires_at: pair.refresh_expires_at,
            csrf_token,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub sessions_revoked: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetTokenStatus {
    pub valid: bool,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoleCount {
    pub role: Role,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_users: i64,
    /// Every role tier, including those with zero accounts.
    pub by_role: Vec<RoleCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub users: Vec<AccountProfile>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedAdmin {
    pub user: AccountProfile,
    pub setup_token_expires_at: DateTime<Utc>,
}
