use std::io::Cursor;

use rocket::http::{ContentType, Status};
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use rocket_okapi::OpenApiError;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse, Responses};
use rocket_okapi::response::OpenApiResponderInner;
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;
use crate::validation::{FieldError, join_errors};

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{}", join_errors(.0))]
    Validation(Vec<FieldError>),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("authentication required")]
    Unauthenticated,
    #[error("token expired")]
    TokenExpired,
    #[error("token invalid")]
    TokenInvalid,
    #[error("token reuse detected")]
    TokenReused,
    #[error("password reset token is invalid or has expired")]
    ResetTokenInvalid,
    #[error("csrf token missing")]
    CsrfMissing,
    #[error("csrf token mismatch")]
    CsrfMismatch,
    #[error("insufficient permissions")]
    Forbidden,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("store error: {0}")]
    Store(StoreError),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("argon2 parameter error: {0}")]
    Argon2(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
    #[error("unexpected error: {0}")]
    Other(String),
}

impl AuthError {
    pub fn status(&self) -> Status {
        match self {
            AuthError::Validation(_) => Status::BadRequest,
            AuthError::InvalidCredentials
            | AuthError::Unauthenticated
            | AuthError::TokenExpired
            | AuthError::TokenInvalid
            | AuthError::TokenReused => Status::Unauthorized,
            AuthError::ResetTokenInvalid => Status::BadRequest,
            AuthError::CsrfMissing => Status::BadRequest,
            AuthError::CsrfMismatch => Status::Unauthorized,
            AuthError::Forbidden => Status::Forbidden,
            AuthError::Conflict(_) => Status::Conflict,
            AuthError::NotFound(_) => Status::NotFound,
            AuthError::Config(_)
            | AuthError::Store(_)
            | AuthError::Jwt(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_)
            | AuthError::Other(_) => Status::InternalServerError,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status() == Status::InternalServerError
    }

    /// Message safe to show the caller; internal detail stays in the log.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => {
                AuthError::Conflict("an account with this email already exists".into())
            }
            StoreError::Missing(_) => AuthError::NotFound("account not found".into()),
            other => AuthError::Store(other),
        }
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::Argon2(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a [FieldError]>,
}

impl<'r> Responder<'r, 'static> for AuthError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if self.is_internal() {
            log::error!("{} {}: {}", request.method(), request.uri(), self);
        } else {
            log::debug!("{} {}: {}", request.method(), request.uri(), self);
        }

        let data = match &self {
            AuthError::Validation(errors) => Some(errors.as_slice()),
            _ => None,
        };
        let envelope = ErrorEnvelope {
            success: false,
            message: self.public_message(),
            data,
        };

        let json = serde_json::to_string(&envelope).unwrap_or_else(|_| {
            r#"{"success":false,"message":"failed to serialize error"}"#.to_string()
        });

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

impl OpenApiResponderInner for AuthError {
    fn responses(_generator: &mut OpenApiGenerator) -> Result<Responses, OpenApiError> {
        let mut responses = Responses::default();
        for (code, description) in [
            ("400", "Validation failed; `data` lists every field error"),
            ("401", "Missing, invalid or expired credentials"),
            ("403", "Authenticated but below the required role tier"),
            ("404", "Resource not found"),
            ("409", "Email already registered"),
            ("500", "Internal error"),
        ] {
            responses.responses.insert(
                code.to_string(),
                RefOr::Object(OpenApiResponse {
                    description: description.to_string(),
                    ..Default::default()
                }),
            );
        }
        Ok(responses)
    }
}
