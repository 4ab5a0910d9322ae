use crate::auth::{AuthError, AuthResult};

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

/// Authentication configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub reset_token_ttl_secs: i64,
    pub admin_setup_ttl_secs: i64,
    pub max_sessions: usize,
    pub refresh_cookie_name: String,
    pub csrf_cookie_name: String,
    pub csrf_header_name: String,
    pub cookie_domain: Option<String>,
    pub cookie_secure: bool,
    pub jwt_secret: String,
    pub jwt_kid: Option<String>,
    pub reset_url: String,
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        let issuer =
            std::env::var("ESTATE_JWT_ISSUER").unwrap_or_else(|_| "http://localhost".into());
        let audience =
            std::env::var("ESTATE_JWT_AUDIENCE").unwrap_or_else(|_| "estate-api".into());
        let access_token_ttl_secs = env_i64("ESTATE_ACCESS_TOKEN_TTL_SECS", 15 * 60);
        let refresh_token_ttl_secs = env_i64("ESTATE_REFRESH_TOKEN_TTL_SECS", 7 * 24 * 60 * 60);
        let reset_token_ttl_secs = env_i64("ESTATE_RESET_TOKEN_TTL_SECS", 60 * 60);
        let admin_setup_ttl_secs = env_i64("ESTATE_ADMIN_SETUP_TTL_SECS", 72 * 60 * 60);
        let max_sessions = std::env::var("ESTATE_MAX_SESSIONS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(10);
        let refresh_cookie_name = std::env::var("ESTATE_REFRESH_COOKIE_NAME")
            .unwrap_or_else(|_| "estate_refresh_token".into());
        let csrf_cookie_name =
            std::env::var("ESTATE_CSRF_COOKIE_NAME").unwrap_or_else(|_| "estate_csrf".into());
        let csrf_header_name =
            std::env::var("ESTATE_CSRF_HEADER_NAME").unwrap_or_else(|_| "X-CSRF-Token".into());
        let cookie_domain = std::env::var("ESTATE_COOKIE_DOMAIN").ok();
        let cookie_secure = std::env::var("ESTATE_COOKIE_SECURE")
            .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "on"))
            .unwrap_or(true);
        let jwt_secret = std::env::var("ESTATE_JWT_SECRET")
            .ok()
            .filter(|secret| !secret.trim().is_empty())
            .ok_or_else(|| AuthError::Config("ESTATE_JWT_SECRET is required".into()))?;
        let jwt_kid = std::env::var("ESTATE_JWT_KID").ok();
        let reset_url = std::env::var("ESTATE_RESET_URL")
            .unwrap_or_else(|_| "http://localhost:3000/reset-password".into());

        Ok(Self {
            issuer,
            audience,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            reset_token_ttl_secs,
            admin_setup_ttl_secs,
            max_sessions,
            refresh_cookie_name,
            csrf_cookie_name,
            csrf_header_name,
            cookie_domain,
            cookie_secure,
            jwt_secret,
            jwt_kid,
            reset_url,
        })
    }

    /// Fixed settings for tests and local tooling.
    pub fn for_tests() -> Self {
        Self {
            issuer: "https://estate.test".into(),
            audience: "estate-api".into(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 7 * 24 * 60 * 60,
            reset_token_ttl_secs: 3600,
            admin_setup_ttl_secs: 72 * 60 * 60,
            max_sessions: 5,
            refresh_cookie_name: "test_refresh_token".into(),
            csrf_cookie_name: "test_csrf".into(),
            csrf_header_name: "X-CSRF-Token".into(),
            cookie_domain: None,
            cookie_secure: false,
            jwt_secret: "super-secret-test-key".into(),
            jwt_kid: Some("test-kid".into()),
            reset_url: "https://estate.test/reset-password".into(),
        }
    }
}
