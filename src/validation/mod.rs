//! Shape validation for sanitized request payloads.
//!
//! A [`Contract`] is a `validator`-annotated request type. [`validate_payload`]
//! runs the sanitizer, deserializes, applies the declared rules and returns
//! either the typed payload or every field error in declaration order.

pub mod guard;

use std::borrow::Cow;

use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::sanitize::{self, SanitizeRules};

pub use guard::Validated;

/// One failed constraint, addressed by its wire field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Join errors as `path: message` pairs for the response message.
pub fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.path, error.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A request shape that can be sanitized and validated.
pub trait Contract: DeserializeOwned + Validate + JsonSchema + Send + 'static {
    /// `(rust_field, wire_field)` pairs in the order errors should be reported.
    const FIELDS: &'static [(&'static str, &'static str)];

    fn rules() -> SanitizeRules {
        SanitizeRules::default()
    }

    /// Constraints spanning more than one field.
    fn check_fields(&self) -> Vec<FieldError> {
        Vec::new()
    }
}

pub fn validate_payload<T: Contract>(raw: Value) -> Result<T, Vec<FieldError>> {
    let sanitized = sanitize::sanitize(raw, &T::rules());
    let value = sanitized
        .value
        .unwrap_or_else(|| Value::Object(Map::new()));
    validate_sanitized(value)
}

/// Validate a value that already passed through the sanitizer.
pub fn validate_sanitized<T: Contract>(value: Value) -> Result<T, Vec<FieldError>> {
    let payload: T = serde_json::from_value(value)
        .map_err(|err| vec![FieldError::new("body", err.to_string())])?;

    let mut errors = match payload.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => collect_errors::<T>(&errors),
    };
    errors.extend(payload.check_fields());

    if errors.is_empty() {
        Ok(payload)
    } else {
        Err(errors)
    }
}

fn collect_errors<T: Contract>(errors: &ValidationErrors) -> Vec<FieldError> {
    let by_field = errors.field_errors();
    let mut collected = Vec::new();
    for (rust_name, wire_name) in T::FIELDS {
        if let Some(field_errors) = by_field.get(*rust_name) {
            collected.extend(
                field_errors
                    .iter()
                    .map(|error| FieldError::new(*wire_name, describe(error))),
            );
        }
    }
    // Anything not declared in FIELDS is still reported, sorted for stable output.
    let mut undeclared: Vec<(&str, &Vec<ValidationError>)> = by_field
        .iter()
        .map(|(name, field_errors)| (&**name, *field_errors))
        .filter(|(name, _)| !T::FIELDS.iter().any(|(rust, _)| rust == name))
        .collect();
    undeclared.sort_by(|a, b| a.0.cmp(b.0));
    for (name, field_errors) in undeclared {
        collected.extend(
            field_errors
                .iter()
                .map(|error| FieldError::new(name, describe(error))),
        );
    }
    collected
}

fn describe(error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => error.code.to_string(),
    }
}

pub(crate) fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

// ===== Shared field rules =====

pub const PASSWORD_MIN_LEN: usize = 8;

/// Registration-time strength rule: minimum length plus lower, upper and digit.
pub fn password_strength(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(invalid(
            "password_length",
            "must be at least 8 characters long",
        ));
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_lower && has_upper && has_digit) {
        return Err(invalid(
            "password_strength",
            "must contain at least one lowercase letter, one uppercase letter, and one number",
        ));
    }
    Ok(())
}

/// Letters, digits, underscores and spaces only.
pub fn username_charset(username: &str) -> Result<(), ValidationError> {
    if username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ')
    {
        Ok(())
    } else {
        Err(invalid(
            "username_charset",
            "can only contain letters, numbers, underscores, and spaces",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize, Validate, JsonSchema)]
    #[serde(default, rename_all = "camelCase")]
    struct Sample {
        #[validate(email(message = "must be a valid email address"))]
        email: String,
        #[validate(custom(function = "password_strength"))]
        new_password: String,
        confirm_password: Option<String>,
    }

    impl Contract for Sample {
        const FIELDS: &'static [(&'static str, &'static str)] = &[
            ("email", "email"),
            ("new_password", "newPassword"),
            ("confirm_password", "confirmPassword"),
        ];

        fn check_fields(&self) -> Vec<FieldError> {
            match &self.confirm_password {
                Some(confirm) if confirm != &self.new_password => {
                    vec![FieldError::new("confirmPassword", "passwords do not match")]
                }
                _ => Vec::new(),
            }
        }
    }

    #[test]
    fn reports_all_errors_in_declared_order() {
        let errors = validate_payload::<Sample>(json!({
            "newPassword": "short",
            "email": "nope",
            "confirmPassword": "other"
        }))
        .expect_err("invalid payload");
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["email", "newPassword", "confirmPassword"]);
        assert_eq!(
            join_errors(&errors),
            "email: must be a valid email address, newPassword: must be at least 8 characters long, confirmPassword: passwords do not match"
        );
    }

    #[test]
    fn sanitizes_before_validating() {
        let payload = validate_payload::<Sample>(json!({
            "email": " <b>user@example.com</b> ",
            "newPassword": "Passw0rd$ne",
        }))
        .expect("valid payload");
        assert_eq!(payload.email, "user@example.com");
        assert_eq!(payload.new_password, "Passw0rd");
    }

    #[test]
    fn blocked_body_reports_missing_fields() {
        let errors =
            validate_payload::<Sample>(json!({"$where": "1"})).expect_err("empty payload");
        assert_eq!(errors[0].path, "email");
    }

    #[test]
    fn type_mismatch_is_a_body_error() {
        let errors = validate_payload::<Sample>(json!({"email": 42})).expect_err("bad type");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "body");
    }

    #[test]
    fn password_strength_rules() {
        assert!(password_strength("Passw0rd").is_ok());
        assert!(password_strength("password1").is_err());
        assert!(password_strength("PASSWORD1").is_err());
        assert!(password_strength("Password").is_err());
        assert!(password_strength("Pw0").is_err());
    }

    #[test]
    fn username_charset_rules() {
        assert!(username_charset("alice_99").is_ok());
        assert!(username_charset("Alice Smith").is_ok());
        assert!(username_charset("alice-99").is_err());
        assert!(username_charset("bob!").is_err());
    }
}
