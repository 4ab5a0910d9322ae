use std::ops::Deref;

use rocket::data::{self, Data, FromData, Limits};
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::Request;
use rocket::serde::json::Json;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::RequestBody;
use rocket_okapi::request::OpenApiFromData;
use serde_json::{Map, Value};

use super::{Contract, FieldError, validate_payload};
use crate::auth::AuthError;

/// JSON body that has been sanitized and validated against `T`.
///
/// Handlers take `Result<Validated<T>, AuthError>` so validation failures are
/// rendered through the response envelope.
#[derive(Debug)]
pub struct Validated<T>(pub T);

impl<T> Validated<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Validated<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T: Contract> FromData<'r> for Validated<T> {
    type Error = AuthError;

    async fn from_data(request: &'r Request<'_>, data: Data<'r>) -> data::Outcome<'r, Self> {
        let limit = request.limits().get("json").unwrap_or(Limits::JSON);
        let body = match data.open(limit).into_string().await {
            Ok(body) if body.is_complete() => body.into_inner(),
            Ok(_) => return body_error(format!("payload exceeds the {limit} limit")),
            Err(err) => return body_error(format!("failed to read body: {err}")),
        };

        // An empty body validates like `{}` so required-field errors are reported.
        let raw = if body.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            match serde_json::from_str::<Value>(&body) {
                Ok(value) => value,
                Err(err) => return body_error(format!("malformed JSON body: {err}")),
            }
        };

        match validate_payload::<T>(raw) {
            Ok(payload) => Outcome::Success(Validated(payload)),
            Err(errors) => Outcome::Error((Status::BadRequest, AuthError::Validation(errors))),
        }
    }
}

fn body_error<'r, T>(message: String) -> data::Outcome<'r, T, AuthError> {
    let err = AuthError::Validation(vec![FieldError::new("body", message)]);
    Outcome::Error((Status::BadRequest, err))
}

impl<'r, T: Contract> OpenApiFromData<'r> for Validated<T> {
    fn request_body(generator: &mut OpenApiGenerator) -> rocket_okapi::Result<RequestBody> {
        Json::<T>::request_body(generator)
    }
}
