use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::auth::{AuthConfig, AuthError, AuthResult};
use crate::models::Role;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct SignedAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Identity proven by a verified access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub account_id: Uuid,
    pub role: Role,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    access_token_ttl: Duration,
    kid: Option<String>,
}

impl JwtService {
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        if config.jwt_secret.is_empty() {
            return Err(AuthError::Config("jwt secret must not be empty".into()));
        }
        let secret_bytes = config.jwt_secret.as_bytes();
        let encoding_key = EncodingKey::from_secret(secret_bytes);
        let decoding_key = DecodingKey::from_secret(secret_bytes);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[config.audience.clone()]);
        validation.set_issuer(&[config.issuer.clone()]);
        validation.set_required_spec_claims(&["exp", "iat", "sub", "iss", "aud"]);
        validation.leeway = 0;

        Ok(Self {
            encoding_key,
            decoding_key,
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_token_ttl: Duration::seconds(config.access_token_ttl_secs),
            kid: config.jwt_kid.clone(),
        })
    }

    pub fn issue_access_token(&self, account_id: Uuid, role: Role) -> AuthResult<SignedAccessToken> {
        self.issue_at(account_id, role, Utc::now())
    }

    fn issue_at(
        &self,
        account_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> AuthResult<SignedAccessToken> {
        let expires_at = now + self.access_token_ttl;

        let mut header = Header::new(Algorithm::HS256);
        header.kid = self.kid.clone();

        let claims = AccessTokenClaims {
            sub: account_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            role,
        };

        let token = encode(&header, &claims, &self.encoding_key)?;

        Ok(SignedAccessToken { token, expires_at })
    }

    pub fn decode_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })
    }

    /// Signature and expiry check only; never consults storage.
    pub fn verify(&self, token: &str) -> AuthResult<VerifiedIdentity> {
        let claims = self.decode_access_token(token)?;
        let account_id = claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| AuthError::TokenInvalid)?;
        Ok(VerifiedIdentity {
            account_id,
            role: claims.role,
        })
    }
}
