mod common;

use common::{PASSWORD, app, login, post_json, refresh_token, register};
use estate_auth::mailer::ResetPurpose;
use rocket::http::Status;
use serde_json::json;

const NEW_PASSWORD: &str = "N3wPassword";

#[test]
fn forgot_password_does_not_reveal_accounts() {
    let app = app();
    register(&app.client, "Jane", "jane@example.com");

    let known = post_json(
        &app.client,
        "/api/v1/auth/forgot-password",
        json!({ "email": "jane@example.com" }),
    );
    let unknown = post_json(
        &app.client,
        "/api/v1/auth/forgot-password",
        json!({ "email": "nobody@example.com" }),
    );

    assert_eq!(known.0, Status::Ok);
    assert_eq!(known, unknown);

    let resets = app.mailer.wait_for_resets(1);
    assert_eq!(resets.len(), 1);
    assert_eq!(resets[0].email, "jane@example.com");
    assert_eq!(resets[0].purpose, ResetPurpose::ForgotPassword);
    assert!(resets[0].reset_url.ends_with(&resets[0].token));
}

#[test]
fn reset_replaces_password_and_revokes_sessions() {
    let app = app();
    let first = register(&app.client, "Jane", "jane@example.com");
    let second = login(&app.client, "jane@example.com", PASSWORD);

    post_json(
        &app.client,
        "/api/v1/auth/forgot-password",
        json!({ "email": "jane@example.com" }),
    );
    let token = app.mailer.wait_for_resets(1).pop().expect("reset mail").token;

    let (status, body) = post_json(
        &app.client,
        "/api/v1/auth/reset-password/validate",
        json!({ "token": token }),
    );
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(body["data"]["email"], "jane@example.com");

    let (status, _) = post_json(
        &app.client,
        "/api/v1/auth/reset-password",
        json!({
            "token": token,
            "newPassword": NEW_PASSWORD,
            "confirmPassword": NEW_PASSWORD,
        }),
    );
    assert_eq!(status, Status::Ok);

    for session in [&first, &second] {
        let (status, _) = post_json(
            &app.client,
            "/api/v1/auth/refresh",
            json!({ "refreshToken": refresh_token(session) }),
        );
        assert_eq!(status, Status::Unauthorized);
    }

    let (old_status, _) = post_json(
        &app.client,
        "/api/v1/auth/login",
        json!({ "email": "jane@example.com", "password": PASSWORD }),
    );
    assert_eq!(old_status, Status::Unauthorized);
    login(&app.client, "jane@example.com", NEW_PASSWORD);

    let (reuse_status, reuse_body) = post_json(
        &app.client,
        "/api/v1/auth/reset-password",
        json!({
            "token": token,
            "newPassword": "An0therPassword",
        }),
    );
    assert_eq!(reuse_status, Status::BadRequest);
    assert_eq!(
        reuse_body["message"],
        "password reset token is invalid or has expired"
    );
}

#[test]
fn malformed_and_unknown_tokens_are_rejected() {
    let app = app();

    let (status, body) = post_json(
        &app.client,
        "/api/v1/auth/reset-password/validate",
        json!({ "token": "short" }),
    );
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["data"][0]["path"], "token");

    let (status, body) = post_json(
        &app.client,
        "/api/v1/auth/reset-password/validate",
        json!({ "token": "ab".repeat(32) }),
    );
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["success"], false);
}

#[test]
fn reset_requires_matching_confirmation() {
    let app = app();
    register(&app.client, "Jane", "jane@example.com");
    post_json(
        &app.client,
        "/api/v1/auth/forgot-password",
        json!({ "email": "jane@example.com" }),
    );
    let token = app.mailer.wait_for_resets(1).pop().expect("reset mail").token;

    let (status, body) = post_json(
        &app.client,
        "/api/v1/auth/reset-password",
        json!({
            "token": token,
            "newPassword": NEW_PASSWORD,
            "confirmPassword": "Mismatch1",
        }),
    );
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["data"][0]["path"], "confirmPassword");

    let (status, _) = post_json(
        &app.client,
        "/api/v1/auth/reset-password/validate",
        json!({ "token": token }),
    );
    assert_eq!(status, Status::Ok);
}
