#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use estate_auth::auth::PasswordService;
use estate_auth::mailer::RecordingMailer;
use estate_auth::models::{Account, Role};
use estate_auth::store::{CredentialStore, MemoryCredentialStore};
use estate_auth::test_support::TestRocketBuilder;
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::Client;
use serde_json::{Value, json};
use uuid::Uuid;

pub const PASSWORD: &str = "Passw0rd";

/// Client plus handles on the store and mailer it was built with.
pub struct TestApp {
    pub client: Client,
    pub store: Arc<MemoryCredentialStore>,
    pub mailer: RecordingMailer,
}

pub fn app() -> TestApp {
    let store = Arc::new(MemoryCredentialStore::new());
    let mailer = RecordingMailer::new();
    let client = TestRocketBuilder::new()
        .with_store(store.clone())
        .with_mailer(mailer.clone())
        .blocking_client();
    TestApp {
        client,
        store,
        mailer,
    }
}

pub fn bearer(token: &str) -> Header<'static> {
    Header::new("Authorization", format!("Bearer {token}"))
}

pub fn post_json(client: &Client, uri: &str, body: Value) -> (Status, Value) {
    let response = client
        .post(uri.to_string())
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch();
    let status = response.status();
    (status, response.into_json().unwrap_or(Value::Null))
}

pub fn register(client: &Client, username: &str, email: &str) -> Value {
    let (status, body) = post_json(
        client,
        "/api/v1/auth/register",
        json!({
            "username": username,
            "email": email,
            "password": PASSWORD,
            "confirmPassword": PASSWORD,
        }),
    );
    assert_eq!(status, Status::Created, "register failed: {body}");
    body["data"].clone()
}

pub fn login(client: &Client, email: &str, password: &str) -> Value {
    let (status, body) = post_json(
        client,
        "/api/v1/auth/login",
        json!({ "email": email, "password": password }),
    );
    assert_eq!(status, Status::Ok, "login failed: {body}");
    body["data"].clone()
}

pub fn access_token(data: &Value) -> String {
    data["accessToken"].as_str().expect("access token").to_string()
}

pub fn refresh_token(data: &Value) -> String {
    data["refreshToken"].as_str().expect("refresh token").to_string()
}

/// Insert an account directly into the store, bypassing registration.
pub fn seed_account(store: &MemoryCredentialStore, email: &str, role: Role) -> Uuid {
    let passwords = PasswordService::new().expect("password service");
    let hash = passwords.hash_password(PASSWORD).expect("hash");
    let account = Account::new("Seeded Account", email, Some(hash), role, Utc::now());
    let id = account.id;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    runtime
        .block_on(store.insert(&account))
        .expect("seed account");
    id
}
