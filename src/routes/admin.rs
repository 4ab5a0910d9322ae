//! Administrative account management. Every route requires at least the admin
//! tier; creating admins requires the owner.

use rocket::State;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket_okapi::openapi;

use crate::auth::requests::{CreateAdminRequest, UpdateRoleRequest};
use crate::auth::responses::{CreatedAdmin, UserPage, UserStats};
use crate::auth::routes::{ApiResult, parse_id};
use crate::auth::{AuthError, AuthState, RequireAdmin, RequireOwner};
use crate::models::{AccountProfile, ApiResponse};
use crate::routes::params::UserListParams;
use crate::validation::Validated;

/// Create an admin account. The new admin receives an account-setup link.
#[openapi(tag = "Admin")]
#[post("/admin/admins", data = "<payload>")]
pub async fn create_admin(
    state: &State<AuthState>,
    owner: Result<RequireOwner, AuthError>,
    payload: Result<Validated<CreateAdminRequest>, AuthError>,
) -> Result<status::Created<Json<ApiResponse<CreatedAdmin>>>, AuthError> {
    let RequireOwner(owner) = owner?;
    let request = payload?.into_inner();
    let created = state.accounts.create_admin(&owner.identity(), request).await?;
    let location = format!("/api/v1/admin/users/{}", created.user.id);
    Ok(status::Created::new(location).body(Json(ApiResponse::with_message(
        created,
        "Admin account created; a setup link has been sent",
    ))))
}

#[openapi(tag = "Admin")]
#[get("/admin/users?<params..>")]
pub async fn list_users(
    state: &State<AuthState>,
    admin: Result<RequireAdmin, AuthError>,
    params: Option<UserListParams>,
) -> ApiResult<UserPage> {
    admin?;
    let params = params.unwrap_or_default();
    let page = state.accounts.list_users(params.page, params.limit).await?;
    Ok(Json(ApiResponse::ok(page)))
}

#[openapi(tag = "Admin")]
#[get("/admin/users/<user_id>")]
pub async fn get_user(
    state: &State<AuthState>,
    admin: Result<RequireAdmin, AuthError>,
    user_id: &str,
) -> ApiResult<AccountProfile> {
    admin?;
    let user_id = parse_id("userId", user_id)?;
    let profile = state.accounts.get_user(user_id).await?;
    Ok(Json(ApiResponse::ok(profile)))
}

#[openapi(tag = "Admin")]
#[put("/admin/users/<user_id>/role", data = "<payload>")]
pub async fn update_user_role(
    state: &State<AuthState>,
    admin: Result<RequireAdmin, AuthError>,
    user_id: &str,
    payload: Result<Validated<UpdateRoleRequest>, AuthError>,
) -> ApiResult<AccountProfile> {
    let RequireAdmin(admin) = admin?;
    let user_id = parse_id("userId", user_id)?;
    let request = payload?.into_inner();
    let role = request
        .target_role()
        .map_err(|err| AuthError::Validation(vec![err]))?;
    let profile = state
        .accounts
        .update_user_role(&admin.identity(), user_id, role)
        .await?;
    Ok(Json(ApiResponse::with_message(profile, "Role updated")))
}

#[openapi(tag = "Admin")]
#[delete("/admin/users/<user_id>")]
pub async fn delete_user(
    state: &State<AuthState>,
    admin: Result<RequireAdmin, AuthError>,
    user_id: &str,
) -> ApiResult<()> {
    let RequireAdmin(admin) = admin?;
    let user_id = parse_id("userId", user_id)?;
    state.accounts.delete_user(&admin.identity(), user_id).await?;
    Ok(Json(ApiResponse::message("User deleted")))
}

#[openapi(tag = "Admin")]
#[get("/admin/stats")]
pub async fn user_stats(
    state: &State<AuthState>,
    admin: Result<RequireAdmin, AuthError>,
) -> ApiResult<UserStats> {
    admin?;
    let stats = state.accounts.stats().await?;
    Ok(Json(ApiResponse::ok(stats)))
}
