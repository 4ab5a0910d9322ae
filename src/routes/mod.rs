//! HTTP route handlers grouped by resource domain.
//!
//! Auth handlers live in [`crate::auth::routes`]; this module holds the
//! administrative, contact and health endpoints. Every handler is annotated
//! with `#[openapi]` so `rocket_okapi` can derive the OpenAPI document.

pub mod admin;
pub mod catchers;
pub mod contact;
pub mod health;
pub mod params;
