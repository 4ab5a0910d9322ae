//! Fallback responses for requests no handler answered, rendered in the
//! standard envelope.

use rocket::Request;
use rocket::http::Status;
use rocket::serde::json::Json;

use crate::models::ApiResponse;

fn envelope(message: &str) -> Json<ApiResponse<()>> {
    Json(ApiResponse::failure(message))
}

#[catch(400)]
pub fn bad_request() -> Json<ApiResponse<()>> {
    envelope("bad request")
}

#[catch(401)]
pub fn unauthorized() -> Json<ApiResponse<()>> {
    envelope("authentication required")
}

#[catch(403)]
pub fn forbidden() -> Json<ApiResponse<()>> {
    envelope("insufficient permissions")
}

#[catch(404)]
pub fn not_found(request: &Request<'_>) -> Json<ApiResponse<()>> {
    Json(ApiResponse::failure(format!("no route for {}", request.uri().path())))
}

#[catch(422)]
pub fn unprocessable() -> Json<ApiResponse<()>> {
    envelope("request could not be processed")
}

#[catch(500)]
pub fn internal_error() -> Json<ApiResponse<()>> {
    envelope("internal server error")
}

#[catch(default)]
pub fn fallback(status: Status, _request: &Request<'_>) -> (Status, Json<ApiResponse<()>>) {
    (status, envelope(status.reason().unwrap_or("request failed")))
}
