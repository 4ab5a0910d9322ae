//! Random token primitives shared by refresh sessions, password resets and CSRF.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use uuid::Uuid;

use crate::auth::{AuthError, AuthResult};

const SECRET_LEN: usize = 32;
const SALT_LEN: usize = 16;
const RESET_TOKEN_BYTES: usize = 32;

/// Length of a reset token on the wire.
pub const RESET_TOKEN_LEN: usize = RESET_TOKEN_BYTES * 2;

/// A refresh token as presented by a client: `<session id>.<secret>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRefreshToken {
    pub session_id: Uuid,
    pub secret: String,
}

impl ParsedRefreshToken {
    pub fn parse(token: &str) -> AuthResult<Self> {
        let (session_id, secret) = token.trim().split_once('.').ok_or(AuthError::TokenInvalid)?;
        let session_id = session_id
            .parse::<Uuid>()
            .map_err(|_| AuthError::TokenInvalid)?;
        if secret.is_empty() {
            return Err(AuthError::TokenInvalid);
        }
        Ok(Self {
            session_id,
            secret: secret.to_string(),
        })
    }
}

/// Fresh refresh secret and the digest to persist for it.
pub struct MintedSecret {
    pub secret: String,
    pub stored_hash: String,
}

pub fn refresh_token_string(session_id: Uuid, secret: &str) -> String {
    format!("{}.{}", session_id, secret)
}

pub fn mint_refresh_secret() -> MintedSecret {
    let secret = generate_secret();
    let salt = generate_salt();
    let stored_hash = encode_hash(&salt, &hash_secret(&secret, &salt));
    MintedSecret {
        secret,
        stored_hash,
    }
}

pub fn verify_refresh_secret(secret: &str, stored: &str) -> bool {
    let Some((salt_b64, hash_b64)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (STANDARD_NO_PAD.decode(salt_b64), STANDARD_NO_PAD.decode(hash_b64))
    else {
        return false;
    };
    let candidate = hash_secret(secret, &salt);
    constant_time_eq(&candidate, &expected)
}

/// 64-character hex reset token.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Lookup digest stored in place of a reset token.
pub fn reset_token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn generate_salt() -> [u8; SALT_LEN] {
    let mut bytes = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

fn hash_secret(secret: &str, salt: &[u8]) -> Vec<u8> {
    let mut hasher = Sha512::new();
    hasher.update(salt);
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn encode_hash(salt: &[u8], hash: &[u8]) -> String {
    format!("{}${}", STANDARD_NO_PAD.encode(salt), STANDARD_NO_PAD.encode(hash))
}

/// Constant-time comparison to avoid timing side-channels.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_secrets_verify_only_against_their_digest() {
        let minted = mint_refresh_secret();
        assert!(verify_refresh_secret(&minted.secret, &minted.stored_hash));
        let other = mint_refresh_secret();
        assert!(!verify_refresh_secret(&other.secret, &minted.stored_hash));
        assert!(!verify_refresh_secret(&minted.secret, "garbage"));
    }

    #[test]
    fn parses_refresh_tokens() {
        let id = Uuid::new_v4();
        let parsed = ParsedRefreshToken::parse(&refresh_token_string(id, "abc")).expect("parse");
        assert_eq!(parsed.session_id, id);
        assert_eq!(parsed.secret, "abc");
        assert!(ParsedRefreshToken::parse("no-dot").is_err());
        assert!(ParsedRefreshToken::parse("not-a-uuid.abc").is_err());
        assert!(ParsedRefreshToken::parse(&format!("{id}.")).is_err());
    }

    #[test]
    fn reset_tokens_are_64_hex_chars_and_unique() {
        let first = generate_reset_token();
        let second = generate_reset_token();
        assert_eq!(first.len(), RESET_TOKEN_LEN);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
        assert_eq!(reset_token_digest(&first), reset_token_digest(&first));
        assert_ne!(reset_token_digest(&first), first);
    }

    #[test]
    fn constant_time_eq_matches_slice_equality() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
