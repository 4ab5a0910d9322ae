//! Query parameter types for list endpoints.

use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

/// Pagination for the account listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, rocket::form::FromForm)]
#[serde(rename_all = "camelCase")]
pub struct UserListParams {
    /// One-based page index (defaults to the first page).
    pub page: Option<i64>,
    /// Accounts per page (clamped between 1 and 100, default 20).
    pub limit: Option<i64>,
}
