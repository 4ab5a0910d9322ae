//! Request contracts for the auth and admin routes.

use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::auth::secrets::RESET_TOKEN_LEN;
use crate::models::Role;
use crate::validation::{Contract, FieldError, invalid, password_strength, username_charset};

fn confirmation_matches(password: &str, confirm: Option<&str>) -> Vec<FieldError> {
    match confirm {
        Some(confirm) if confirm != password => {
            vec![FieldError::new("confirmPassword", "passwords do not match")]
        }
        _ => Vec::new(),
    }
}

fn reset_token_format(token: &str) -> Result<(), ValidationError> {
    if token.len() == RESET_TOKEN_LEN && token.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(invalid(
            "reset_token_format",
            "must be a 64-character reset token",
        ))
    }
}

fn role_name(role: &str) -> Result<(), ValidationError> {
    role.parse::<Role>()
        .map(|_| ())
        .map_err(|_| invalid("role", "must be one of user, broker, admin, owner"))
}

#[derive(Debug, Clone, Default, Deserialize, Validate, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(
        length(min = 3, max = 30, message = "must be between 3 and 30 characters"),
        custom(function = "username_charset")
    )]
    pub username: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "password_strength"))]
    pub password: String,
    pub confirm_password: Option<String>,
    /// Optional label for the device, e.g. "Pixel 8".
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub device: Option<String>,
}

impl Contract for RegisterRequest {
    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("username", "username"),
        ("email", "email"),
        ("password", "password"),
        ("confirm_password", "confirmPassword"),
        ("device", "device"),
    ];

    fn check_fields(&self) -> Vec<FieldError> {
        confirmation_matches(&self.password, self.confirm_password.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub device: Option<String>,
}

impl Contract for LoginRequest {
    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("email", "email"),
        ("password", "password"),
        ("device", "device"),
    ];
}

#[derive(Debug, Clone, Default, Deserialize, Validate, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    /// Omit when the token travels in the refresh cookie or `X-Refresh-Token`.
    pub refresh_token: Option<String>,
}

impl Contract for RefreshRequest {
    const FIELDS: &'static [(&'static str, &'static str)] = &[("refresh_token", "refreshToken")];
}

#[derive(Debug, Clone, Default, Deserialize, Validate, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
    /// Revoke every session on the account instead of just this one.
    pub all_devices: bool,
}

impl Contract for LogoutRequest {
    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("refresh_token", "refreshToken"),
        ("all_devices", "allDevices"),
    ];
}

#[derive(Debug, Clone, Default, Deserialize, Validate, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

impl Contract for ForgotPasswordRequest {
    const FIELDS: &'static [(&'static str, &'static str)] = &[("email", "email")];
}

#[derive(Debug, Clone, Default, Deserialize, Validate, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidateResetTokenRequest {
    #[validate(custom(function = "reset_token_format"))]
    pub token: String,
}

impl Contract for ValidateResetTokenRequest {
    const FIELDS: &'static [(&'static str, &'static str)] = &[("token", "token")];
}

#[derive(Debug, Clone, Default, Deserialize, Validate, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(custom(function = "reset_token_format"))]
    pub token: String,
    #[validate(custom(function = "password_strength"))]
    pub new_password: String,
    pub confirm_password: Option<String>,
}

impl Contract for ResetPasswordRequest {
    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("token", "token"),
        ("new_password", "newPassword"),
        ("confirm_password", "confirmPassword"),
    ];

    fn check_fields(&self) -> Vec<FieldError> {
        confirmation_matches(&self.new_password, self.confirm_password.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateAdminRequest {
    #[validate(
        length(min = 3, max = 30, message = "must be between 3 and 30 characters"),
        custom(function = "username_charset")
    )]
    pub username: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

impl Contract for CreateAdminRequest {
    const FIELDS: &'static [(&'static str, &'static str)] =
        &[("username", "username"), ("email", "email")];
}

#[derive(Debug, Clone, Default, Deserialize, Validate, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    /// One of `user`, `broker`, `admin`, `owner`.
    #[validate(custom(function = "role_name"))]
    pub role: String,
}

impl UpdateRoleRequest {
    /// Only meaningful after validation.
    pub fn target_role(&self) -> Result<Role, FieldError> {
        self.role
            .parse::<Role>()
            .map_err(|err| FieldError::new("role", err.to_string()))
    }
}

impl Contract for UpdateRoleRequest {
    const FIELDS: &'static [(&'static str, &'static str)] = &[("role", "role")];
}

#[derive(Debug, Clone, Default, Deserialize, Validate, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(
        length(min = 3, max = 30, message = "must be between 3 and 30 characters"),
        custom(function = "username_charset")
    )]
    pub username: String,
}

impl Contract for UpdateProfileRequest {
    const FIELDS: &'static [(&'static str, &'static str)] = &[("username", "username")];
}
