//! Public contact form. The message is sanitized and validated like any other
//! payload, then handed to the mailer for the configured inbox.

use rocket::State;
use rocket::serde::json::Json;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::Deserialize;
use validator::Validate;

use crate::auth::routes::ApiResult;
use crate::auth::{AuthError, AuthState};
use crate::mailer::{ContactNotification, MailerConfig};
use crate::models::ApiResponse;
use crate::validation::{Contract, Validated};

#[derive(Debug, Clone, Default, Deserialize, Validate, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactRequest {
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(max = 30, message = "must be at most 30 characters"))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 5000, message = "must be between 1 and 5000 characters"))]
    pub message: String,
    /// Listing the enquiry is about, if any.
    #[validate(length(max = 64, message = "must be at most 64 characters"))]
    pub property_id: Option<String>,
}

impl Contract for ContactRequest {
    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("name", "name"),
        ("email", "email"),
        ("phone", "phone"),
        ("message", "message"),
        ("property_id", "propertyId"),
    ];
}

#[openapi(tag = "Contact")]
#[post("/contact", data = "<payload>")]
pub async fn submit_contact(
    state: &State<AuthState>,
    mail_config: &State<MailerConfig>,
    payload: Result<Validated<ContactRequest>, AuthError>,
) -> ApiResult<()> {
    let request = payload?.into_inner();
    let notification = ContactNotification {
        name: request.name,
        email: request.email.trim().to_lowercase(),
        phone: request.phone.filter(|phone| !phone.is_empty()),
        message: request.message,
        property_id: request.property_id.filter(|id| !id.is_empty()),
        recipient: mail_config.contact_inbox.clone(),
    };

    state
        .mailer
        .send_contact_notification(&notification)
        .await
        .map_err(|err| AuthError::Other(format!("contact notification failed: {err}")))?;

    Ok(Json(ApiResponse::message(
        "Thank you for your message; we will be in touch soon",
    )))
}
