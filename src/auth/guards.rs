use rocket::Request;
use rocket::request::{FromRequest, Outcome};
use rocket_okapi::request::OpenApiFromRequest;
use uuid::Uuid;

use crate::auth::jwt::VerifiedIdentity;
use crate::auth::tokens::DeviceMeta;
use crate::auth::{AuthError, AuthResult, AuthState};
use crate::models::Role;
use crate::sanitize::markup::purify_text;

pub const REFRESH_TOKEN_HEADER: &str = "X-Refresh-Token";
pub const DEVICE_NAME_HEADER: &str = "X-Device-Name";
const DEVICE_FIELD_MAX_CHARS: usize = 200;

/// Account resolved for the current request, if any. Read by the request logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolvedAccount(pub Option<Uuid>);

/// Any caller holding a valid access token.
#[derive(Debug, Clone, Copy, OpenApiFromRequest)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn identity(&self) -> VerifiedIdentity {
        VerifiedIdentity {
            account_id: self.id,
            role: self.role,
        }
    }
}

impl From<VerifiedIdentity> for AuthUser {
    fn from(identity: VerifiedIdentity) -> Self {
        Self {
            id: identity.account_id,
            role: identity.role,
        }
    }
}

pub type RequireAuth = AuthUser;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match authenticate(request) {
            Ok(identity) => Outcome::Success(identity.into()),
            Err(err) => Outcome::Error((err.status(), err)),
        }
    }
}

/// Fails with `Forbidden` unless `identity` sits at or above `min`.
pub fn require_role(identity: &VerifiedIdentity, min: Role) -> AuthResult<()> {
    if identity.role.at_least(min) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

macro_rules! role_guard {
    ($(#[$doc:meta])* $name:ident, $min:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, OpenApiFromRequest)]
        pub struct $name(pub AuthUser);

        impl $name {
            pub const MIN_ROLE: Role = $min;
        }

        #[rocket::async_trait]
        impl<'r> FromRequest<'r> for $name {
            type Error = AuthError;

            async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
                let checked = authenticate(request)
                    .and_then(|identity| require_role(&identity, $min).map(|()| identity));
                match checked {
                    Ok(identity) => Outcome::Success($name(identity.into())),
                    Err(err) => Outcome::Error((err.status(), err)),
                }
            }
        }
    };
}

role_guard!(
    /// Broker tier or above.
    RequireBroker,
    Role::Broker
);
role_guard!(
    /// Admin tier or above.
    RequireAdmin,
    Role::Admin
);
role_guard!(
    /// Owner only.
    RequireOwner,
    Role::Owner
);

fn authenticate(request: &Request<'_>) -> AuthResult<VerifiedIdentity> {
    let state = request
        .rocket()
        .state::<AuthState>()
        .ok_or_else(|| AuthError::Config("AuthState missing from state".into()))?;
    let token = bearer_token_from_request(request)?;
    let identity = state.tokens.verify_access_token(token)?;
    request.local_cache(|| ResolvedAccount(Some(identity.account_id)));
    Ok(identity)
}

fn bearer_token_from_request<'a>(request: &'a Request<'_>) -> AuthResult<&'a str> {
    let header = request
        .headers()
        .get_one("Authorization")
        .ok_or(AuthError::Unauthenticated)?;
    let (scheme, token) = header.split_once(' ').ok_or(AuthError::Unauthenticated)?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() {
        Ok(token)
    } else {
        Err(AuthError::Unauthenticated)
    }
}

/// Device label and user agent of the calling client, stripped of markup.
#[derive(Debug, Clone, OpenApiFromRequest)]
pub struct ClientDevice(pub DeviceMeta);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientDevice {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let header = |name: &str| {
            request
                .headers()
                .get_one(name)
                .map(purify_text)
                .filter(|value| !value.is_empty())
                .map(|value| value.chars().take(DEVICE_FIELD_MAX_CHARS).collect::<String>())
        };
        Outcome::Success(ClientDevice(DeviceMeta::new(
            header(DEVICE_NAME_HEADER),
            header("User-Agent"),
        )))
    }
}

/// Where a refresh token was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshSource {
    Header,
    Cookie,
}

/// Refresh token presented outside the JSON body: the `X-Refresh-Token` header,
/// or the refresh cookie accompanied by a matching CSRF header.
#[derive(Debug, Clone, OpenApiFromRequest)]
pub struct RefreshCredential {
    pub token: Option<String>,
    pub source: Option<RefreshSource>,
}

impl RefreshCredential {
    /// Prefer the body token when the client sent one.
    pub fn resolve(self, body_token: Option<String>) -> AuthResult<String> {
        body_token
            .filter(|token| !token.trim().is_empty())
            .or(self.token)
            .ok_or(AuthError::Unauthenticated)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RefreshCredential {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match extract_refresh(request) {
            Ok(credential) => Outcome::Success(credential),
            Err(err) => Outcome::Error((err.status(), err)),
        }
    }
}

fn extract_refresh(request: &Request<'_>) -> AuthResult<RefreshCredential> {
    if let Some(token) = request
        .headers()
        .get_one(REFRESH_TOKEN_HEADER)
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Ok(RefreshCredential {
            token: Some(token.to_string()),
            source: Some(RefreshSource::Header),
        });
    }

    let state = request
        .rocket()
        .state::<AuthState>()
        .ok_or_else(|| AuthError::Config("AuthState missing from state".into()))?;
    let config = &state.config;

    let Some(cookie) = request.cookies().get(&config.refresh_cookie_name) else {
        return Ok(RefreshCredential {
            token: None,
            source: None,
        });
    };

    let csrf_cookie = request
        .cookies()
        .get(&config.csrf_cookie_name)
        .map(|cookie| cookie.value().to_string())
        .ok_or(AuthError::CsrfMissing)?;
    let csrf_header = request
        .headers()
        .get_one(&config.csrf_header_name)
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::CsrfMissing)?;
    if !crate::auth::secrets::constant_time_eq(csrf_cookie.as_bytes(), csrf_header.as_bytes()) {
        return Err(AuthError::CsrfMismatch);
    }

    Ok(RefreshCredential {
        token: Some(cookie.value().to_string()),
        source: Some(RefreshSource::Cookie),
    })
}
