use chrono::{DateTime, Utc};
use rocket::State;
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::response::status;
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use time::Duration as TimeDuration;
use uuid::Uuid;

use crate::auth::guards::{AuthUser, ClientDevice, RefreshCredential};
use crate::auth::requests::{
    ForgotPasswordRequest, LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest,
    ResetPasswordRequest, UpdateProfileRequest, ValidateResetTokenRequest,
};
use crate::auth::responses::{AuthResponse, LogoutResponse, RefreshResponse, ResetTokenStatus};
use crate::auth::secrets::generate_csrf_token;
use crate::auth::{AuthConfig, AuthError, AuthResult, AuthState, TokenPair};
use crate::models::{AccountProfile, ApiResponse, SessionView};
use crate::validation::{FieldError, Validated};

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AuthError>;

/// Cookie scope for the refresh and CSRF cookies.
pub const AUTH_COOKIE_PATH: &str = "/api/v1/auth";

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for that email, a password reset link has been sent";

#[openapi(tag = "Auth")]
#[post("/auth/register", data = "<payload>")]
pub async fn register(
    state: &State<AuthState>,
    cookies: &CookieJar<'_>,
    device: ClientDevice,
    payload: Result<Validated<RegisterRequest>, AuthError>,
) -> Result<status::Created<Json<ApiResponse<AuthResponse>>>, AuthError> {
    let request = payload?.into_inner();
    let (profile, pair) = state.accounts.register(request, device.0).await?;
    let csrf_token = set_session_cookies(cookies, &state.config, &pair);

    let body = ApiResponse::with_message(
        AuthResponse::new(pair, csrf_token, profile),
        "Registration successful",
    );
    Ok(status::Created::new("/api/v1/auth/me").body(Json(body)))
}

#[openapi(tag = "Auth")]
#[post("/auth/login", data = "<payload>")]
pub async fn login(
    state: &State<AuthState>,
    cookies: &CookieJar<'_>,
    device: ClientDevice,
    payload: Result<Validated<LoginRequest>, AuthError>,
) -> ApiResult<AuthResponse> {
    let request = payload?.into_inner();
    let (profile, pair) = state.accounts.login(request, device.0).await?;
    let csrf_token = set_session_cookies(cookies, &state.config, &pair);

    Ok(Json(ApiResponse::with_message(
        AuthResponse::new(pair, csrf_token, profile),
        "Login successful",
    )))
}

/// Rotate a refresh token. No access token is required.
#[openapi(tag = "Auth")]
#[post("/auth/refresh", data = "<payload>")]
pub async fn refresh(
    state: &State<AuthState>,
    cookies: &CookieJar<'_>,
    credential: Result<RefreshCredential, AuthError>,
    payload: Result<Validated<RefreshRequest>, AuthError>,
) -> ApiResult<RefreshResponse> {
    let request = payload?.into_inner();
    let token = match request.refresh_token.filter(|token| !token.trim().is_empty()) {
        Some(token) => token,
        None => credential?.resolve(None)?,
    };

    match state.accounts.refresh(&token).await {
        Ok(pair) => {
            let csrf_token = set_session_cookies(cookies, &state.config, &pair);
            Ok(Json(ApiResponse::ok(RefreshResponse::new(pair, csrf_token))))
        }
        Err(err) => {
            clear_session_cookies(cookies, &state.config);
            Err(err)
        }
    }
}

#[openapi(tag = "Auth")]
#[post("/auth/logout", data = "<payload>")]
pub async fn logout(
    state: &State<AuthState>,
    cookies: &CookieJar<'_>,
    user: Result<AuthUser, AuthError>,
    credential: Result<RefreshCredential, AuthError>,
    payload: Result<Validated<LogoutRequest>, AuthError>,
) -> ApiResult<LogoutResponse> {
    let user = user?;
    let request = payload?.into_inner();
    let token = match request.refresh_token {
        Some(token) if !token.trim().is_empty() => Some(token),
        _ if request.all_devices => None,
        _ => Some(credential?.resolve(None).map_err(|_| {
            AuthError::Validation(vec![FieldError::new("refreshToken", "is required")])
        })?),
    };

    let sessions_revoked = state
        .accounts
        .logout(&user.identity(), token.as_deref(), request.all_devices)
        .await?;
    clear_session_cookies(cookies, &state.config);

    Ok(Json(ApiResponse::with_message(
        LogoutResponse { sessions_revoked },
        "Logged out",
    )))
}

#[openapi(tag = "Auth")]
#[get("/auth/me")]
pub async fn me(
    state: &State<AuthState>,
    user: Result<AuthUser, AuthError>,
) -> ApiResult<AccountProfile> {
    let user = user?;
    let profile = state.accounts.profile(user.id).await?;
    Ok(Json(ApiResponse::ok(profile)))
}

#[openapi(tag = "Auth")]
#[put("/auth/me", data = "<payload>")]
pub async fn update_me(
    state: &State<AuthState>,
    user: Result<AuthUser, AuthError>,
    payload: Result<Validated<UpdateProfileRequest>, AuthError>,
) -> ApiResult<AccountProfile> {
    let user = user?;
    let request = payload?.into_inner();
    let profile = state.accounts.update_profile(user.id, &request.username).await?;
    Ok(Json(ApiResponse::with_message(profile, "Profile updated")))
}

/// Live sessions for the calling account.
#[openapi(tag = "Auth")]
#[get("/auth/sessions")]
pub async fn list_sessions(
    state: &State<AuthState>,
    user: Result<AuthUser, AuthError>,
) -> ApiResult<Vec<SessionView>> {
    let user = user?;
    let sessions = state.accounts.list_sessions(user.id).await?;
    Ok(Json(ApiResponse::ok(sessions)))
}

#[openapi(tag = "Auth")]
#[delete("/auth/sessions/<session_id>")]
pub async fn revoke_session(
    state: &State<AuthState>,
    user: Result<AuthUser, AuthError>,
    session_id: &str,
) -> ApiResult<()> {
    let user = user?;
    let session_id = parse_id("sessionId", session_id)?;
    state.accounts.revoke_session_by_id(user.id, session_id).await?;
    Ok(Json(ApiResponse::message("Session revoked")))
}

/// Always answers with the same message, whether or not the email is known.
#[openapi(tag = "Auth")]
#[post("/auth/forgot-password", data = "<payload>")]
pub async fn forgot_password(
    state: &State<AuthState>,
    payload: Result<Validated<ForgotPasswordRequest>, AuthError>,
) -> ApiResult<()> {
    let request = payload?.into_inner();
    state.resets.forgot(&request.email).await?;
    Ok(Json(ApiResponse::message(FORGOT_PASSWORD_MESSAGE)))
}

#[openapi(tag = "Auth")]
#[post("/auth/reset-password/validate", data = "<payload>")]
pub async fn validate_reset_token(
    state: &State<AuthState>,
    payload: Result<Validated<ValidateResetTokenRequest>, AuthError>,
) -> ApiResult<ResetTokenStatus> {
    let request = payload?.into_inner();
    let token_status = state.resets.validate_token(&request.token).await?;
    Ok(Json(ApiResponse::ok(token_status)))
}

/// Set a new password. Every session on the account is revoked.
#[openapi(tag = "Auth")]
#[post("/auth/reset-password", data = "<payload>")]
pub async fn reset_password(
    state: &State<AuthState>,
    cookies: &CookieJar<'_>,
    payload: Result<Validated<ResetPasswordRequest>, AuthError>,
) -> ApiResult<()> {
    let request = payload?.into_inner();
    state
        .resets
        .reset(&request.token, &request.new_password)
        .await?;
    clear_session_cookies(cookies, &state.config);
    Ok(Json(ApiResponse::message(
        "Password has been reset; please log in again",
    )))
}

pub(crate) fn parse_id(field: &str, raw: &str) -> AuthResult<Uuid> {
    raw.parse::<Uuid>()
        .map_err(|_| AuthError::Validation(vec![FieldError::new(field, "must be a valid UUID")]))
}

/// Set the refresh and CSRF cookies for `pair`, returning the CSRF token.
fn set_session_cookies(cookies: &CookieJar<'_>, config: &AuthConfig, pair: &TokenPair) -> String {
    let csrf_token = generate_csrf_token();
    cookies.add(auth_cookie(
        config,
        config.refresh_cookie_name.clone(),
        pair.refresh_token.clone(),
        true,
        pair.refresh_expires_at,
    ));
    cookies.add(auth_cookie(
        config,
        config.csrf_cookie_name.clone(),
        csrf_token.clone(),
        false,
        pair.refresh_expires_at,
    ));
    csrf_token
}

fn auth_cookie(
    config: &AuthConfig,
    name: String,
    value: String,
    http_only: bool,
    expires_at: DateTime<Utc>,
) -> Cookie<'static> {
    let max_age_secs = (expires_at - Utc::now()).num_seconds().max(0);
    let mut cookie = Cookie::build((name, value))
        .path(AUTH_COOKIE_PATH)
        .http_only(http_only)
        .same_site(SameSite::Strict)
        .secure(config.cookie_secure)
        .max_age(TimeDuration::seconds(max_age_secs))
        .build();

    if let Some(domain) = &config.cookie_domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

fn clear_session_cookies(cookies: &CookieJar<'_>, config: &AuthConfig) {
    for name in [&config.refresh_cookie_name, &config.csrf_cookie_name] {
        let mut cookie = Cookie::build((name.clone(), String::new()))
            .path(AUTH_COOKIE_PATH)
            .removal()
            .build();

        if let Some(domain) = &config.cookie_domain {
            cookie.set_domain(domain.clone());
        }
        cookies.add(cookie);
    }
}
