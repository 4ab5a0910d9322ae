mod common;

use common::{PASSWORD, access_token, app, bearer, login, post_json, refresh_token, register};
use rocket::http::{ContentType, Header, Status};
use serde_json::{Value, json};

#[test]
fn register_normalizes_email_and_sets_cookies() {
    let app = app();

    let response = app
        .client
        .post("/api/v1/auth/register")
        .header(ContentType::JSON)
        .body(
            json!({
                "username": "Jane Doe",
                "email": "  Jane@Example.COM ",
                "password": PASSWORD,
                "confirmPassword": PASSWORD,
            })
            .to_string(),
        )
        .dispatch();
    assert_eq!(response.status(), Status::Created);

    let refresh_cookie = response
        .cookies()
        .get("test_refresh_token")
        .expect("refresh cookie")
        .clone();
    assert_eq!(refresh_cookie.http_only(), Some(true));
    assert_eq!(refresh_cookie.path(), Some("/api/v1/auth"));
    let csrf_cookie = response.cookies().get("test_csrf").expect("csrf cookie").clone();
    assert_ne!(csrf_cookie.http_only(), Some(true));

    let body: Value = response.into_json().expect("json body");
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user"]["email"], "jane@example.com");
    assert_eq!(body["data"]["user"]["role"], "user");
    assert_eq!(body["data"]["csrfToken"], csrf_cookie.value());
    assert_eq!(body["data"]["refreshToken"], refresh_cookie.value());
    assert!(body["data"]["user"].get("passwordHash").is_none());
}

#[test]
fn duplicate_registration_conflicts() {
    let app = app();
    register(&app.client, "Jane", "jane@example.com");

    let (status, body) = post_json(
        &app.client,
        "/api/v1/auth/register",
        json!({
            "username": "Other Jane",
            "email": "JANE@example.com",
            "password": PASSWORD,
        }),
    );
    assert_eq!(status, Status::Conflict);
    assert_eq!(body["success"], false);
}

#[test]
fn invalid_registration_lists_every_field() {
    let app = app();

    let (status, body) = post_json(
        &app.client,
        "/api/v1/auth/register",
        json!({
            "username": "x",
            "email": "not-an-email",
            "password": "short",
            "confirmPassword": "different",
        }),
    );
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["success"], false);

    let paths: Vec<&str> = body["data"]
        .as_array()
        .expect("field errors")
        .iter()
        .filter_map(|error| error["path"].as_str())
        .collect();
    assert_eq!(paths, vec!["username", "email", "password", "confirmPassword"]);
}

#[test]
fn operator_payloads_never_reach_the_store() {
    let app = app();
    register(&app.client, "Jane", "jane@example.com");

    let (status, body) = post_json(
        &app.client,
        "/api/v1/auth/login",
        json!({ "email": { "$ne": null }, "password": { "$gt": "" } }),
    );
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["success"], false);
}

#[test]
fn login_failures_are_indistinguishable() {
    let app = app();
    register(&app.client, "Jane", "jane@example.com");

    let (wrong_status, wrong_body) = post_json(
        &app.client,
        "/api/v1/auth/login",
        json!({ "email": "jane@example.com", "password": "Wr0ngPassword" }),
    );
    let (unknown_status, unknown_body) = post_json(
        &app.client,
        "/api/v1/auth/login",
        json!({ "email": "nobody@example.com", "password": "Wr0ngPassword" }),
    );

    assert_eq!(wrong_status, Status::Unauthorized);
    assert_eq!(unknown_status, Status::Unauthorized);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["message"], "invalid email or password");
}

#[test]
fn me_requires_a_valid_access_token() {
    let app = app();
    let session = register(&app.client, "Jane", "jane@example.com");

    let missing = app.client.get("/api/v1/auth/me").dispatch();
    assert_eq!(missing.status(), Status::Unauthorized);
    let body: Value = missing.into_json().expect("json body");
    assert_eq!(body["message"], "authentication required");

    let garbage = app
        .client
        .get("/api/v1/auth/me")
        .header(bearer("not-a-jwt"))
        .dispatch();
    assert_eq!(garbage.status(), Status::Unauthorized);

    let ok = app
        .client
        .get("/api/v1/auth/me")
        .header(bearer(&access_token(&session)))
        .dispatch();
    assert_eq!(ok.status(), Status::Ok);
    let body: Value = ok.into_json().expect("json body");
    assert_eq!(body["data"]["email"], "jane@example.com");
}

#[test]
fn profile_updates_are_sanitized() {
    let app = app();
    let session = register(&app.client, "Jane", "jane@example.com");

    let response = app
        .client
        .put("/api/v1/auth/me")
        .header(ContentType::JSON)
        .header(bearer(&access_token(&session)))
        .body(json!({ "username": "<b>Jane Smith</b>" }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().expect("json body");
    assert_eq!(body["data"]["username"], "Jane Smith");
}

#[test]
fn refresh_tokens_are_single_use() {
    let app = app();
    let session = register(&app.client, "Jane", "jane@example.com");
    let original = refresh_token(&session);

    let rotated = app
        .client
        .post("/api/v1/auth/refresh")
        .header(Header::new("X-Refresh-Token", original.clone()))
        .dispatch();
    assert_eq!(rotated.status(), Status::Ok);
    let rotated: Value = rotated.into_json().expect("json body");
    let next = rotated["data"]["refreshToken"].as_str().expect("token").to_string();
    assert_ne!(next, original);

    let (replay_status, replay_body) = post_json(
        &app.client,
        "/api/v1/auth/refresh",
        json!({ "refreshToken": original }),
    );
    assert_eq!(replay_status, Status::Unauthorized);
    assert_eq!(replay_body["message"], "token reuse detected");

    let (status, body) = post_json(
        &app.client,
        "/api/v1/auth/refresh",
        json!({ "refreshToken": next }),
    );
    assert_eq!(status, Status::Unauthorized);
    assert_eq!(body["message"], "token invalid");
}

#[test]
fn refresh_without_any_token_is_unauthenticated() {
    let app = app();

    let (status, body) = post_json(&app.client, "/api/v1/auth/refresh", json!({}));
    assert_eq!(status, Status::Unauthorized);
    assert_eq!(body["success"], false);
}

#[test]
fn cookie_refresh_requires_matching_csrf_header() {
    let app = app();
    let session = register(&app.client, "Jane", "jane@example.com");
    let csrf = session["csrfToken"].as_str().expect("csrf token").to_string();

    let missing = app.client.post("/api/v1/auth/refresh").dispatch();
    assert_eq!(missing.status(), Status::BadRequest);

    let mismatched = app
        .client
        .post("/api/v1/auth/refresh")
        .header(Header::new("X-CSRF-Token", "forged"))
        .dispatch();
    assert_eq!(mismatched.status(), Status::Unauthorized);

    let ok = app
        .client
        .post("/api/v1/auth/refresh")
        .header(Header::new("X-CSRF-Token", csrf.clone()))
        .dispatch();
    assert_eq!(ok.status(), Status::Ok);
    let body: Value = ok.into_json().expect("json body");
    assert_ne!(body["data"]["refreshToken"], session["refreshToken"]);
    assert_ne!(body["data"]["csrfToken"], csrf.as_str());
}

#[test]
fn logout_revokes_the_presented_session() {
    let app = app();
    let session = register(&app.client, "Jane", "jane@example.com");
    let token = refresh_token(&session);

    let (unauthenticated, _) = post_json(
        &app.client,
        "/api/v1/auth/logout",
        json!({ "refreshToken": token }),
    );
    assert_eq!(unauthenticated, Status::Unauthorized);

    let response = app
        .client
        .post("/api/v1/auth/logout")
        .header(ContentType::JSON)
        .header(bearer(&access_token(&session)))
        .body(json!({ "refreshToken": token }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().expect("json body");
    assert_eq!(body["data"]["sessionsRevoked"], 1);

    let (status, _) = post_json(
        &app.client,
        "/api/v1/auth/refresh",
        json!({ "refreshToken": token }),
    );
    assert_eq!(status, Status::Unauthorized);
}

#[test]
fn logout_everywhere_revokes_every_device() {
    let app = app();
    let first = register(&app.client, "Jane", "jane@example.com");
    let second = login(&app.client, "jane@example.com", PASSWORD);

    let response = app
        .client
        .post("/api/v1/auth/logout")
        .header(ContentType::JSON)
        .header(bearer(&access_token(&second)))
        .body(json!({ "allDevices": true }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().expect("json body");
    assert_eq!(body["data"]["sessionsRevoked"], 2);

    for session in [&first, &second] {
        let (status, _) = post_json(
            &app.client,
            "/api/v1/auth/refresh",
            json!({ "refreshToken": refresh_token(session) }),
        );
        assert_eq!(status, Status::Unauthorized);
    }
}

#[test]
fn sessions_can_be_listed_and_revoked() {
    let app = app();
    let first = register(&app.client, "Jane", "jane@example.com");

    let second = app
        .client
        .post("/api/v1/auth/login")
        .header(ContentType::JSON)
        .header(Header::new("X-Device-Name", "Pixel 8"))
        .body(json!({ "email": "jane@example.com", "password": PASSWORD }).to_string())
        .dispatch();
    assert_eq!(second.status(), Status::Ok);
    let second: Value = second.into_json().expect("json body");
    let access = access_token(&second["data"]);

    let listed = app
        .client
        .get("/api/v1/auth/sessions")
        .header(bearer(&access))
        .dispatch();
    assert_eq!(listed.status(), Status::Ok);
    let listed: Value = listed.into_json().expect("json body");
    let sessions = listed["data"].as_array().expect("sessions").clone();
    assert_eq!(sessions.len(), 2);

    let pixel = sessions
        .iter()
        .find(|session| session["device"] == "Pixel 8")
        .expect("named device session");
    let pixel_id = pixel["id"].as_str().expect("session id");
    assert!(refresh_token(&second["data"]).starts_with(pixel_id));

    let other_id = sessions
        .iter()
        .find(|session| session["id"] != pixel["id"])
        .and_then(|session| session["id"].as_str())
        .expect("first session id")
        .to_string();

    let revoked = app
        .client
        .delete(format!("/api/v1/auth/sessions/{other_id}"))
        .header(bearer(&access))
        .dispatch();
    assert_eq!(revoked.status(), Status::Ok);

    let again = app
        .client
        .delete(format!("/api/v1/auth/sessions/{other_id}"))
        .header(bearer(&access))
        .dispatch();
    assert_eq!(again.status(), Status::NotFound);

    let malformed = app
        .client
        .delete("/api/v1/auth/sessions/not-a-uuid")
        .header(bearer(&access))
        .dispatch();
    assert_eq!(malformed.status(), Status::BadRequest);

    let (status, _) = post_json(
        &app.client,
        "/api/v1/auth/refresh",
        json!({ "refreshToken": refresh_token(&first) }),
    );
    assert_eq!(status, Status::Unauthorized);
}

#[test]
fn session_listing_never_echoes_markup_from_headers() {
    let app = app();
    register(&app.client, "Jane", "jane@example.com");

    let response = app
        .client
        .post("/api/v1/auth/login")
        .header(ContentType::JSON)
        .header(Header::new("X-Device-Name", "<b>Pixel 8</b><script>steal()</script>"))
        .header(Header::new("User-Agent", "<<b>script>alert(1)<</b>/script>Firefox"))
        .body(json!({ "email": "jane@example.com", "password": PASSWORD }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let login: Value = response.into_json().expect("json body");

    let listed = app
        .client
        .get("/api/v1/auth/sessions")
        .header(bearer(&access_token(&login["data"])))
        .dispatch();
    let listed: Value = listed.into_json().expect("json body");
    let pixel = listed["data"]
        .as_array()
        .expect("sessions")
        .iter()
        .find(|session| session["device"] == "Pixel 8")
        .cloned()
        .expect("sanitized device name");
    assert_eq!(pixel["userAgent"], "Firefox");
}
