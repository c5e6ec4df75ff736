//! Authentication - credential hashing, JWT issue/verify, extractors
//!
//! ## Responsibilities
//!
//! - Salted SHA-256 password hashes (`v1$<salt>$<digest>`)
//! - HS256 access tokens carrying the username and key-user flag
//! - `AuthUser` / `KeyUser` extractors for the admin routes; the token is
//!   read from the `access_token` cookie or an `Authorization: Bearer`
//!   header, and the principal is re-checked against the user store on
//!   every request

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::state::AppState;
use crate::user_store::UserInfo;

/// Access token lifetime (24 hours)
pub const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Cookie holding the access token
pub const TOKEN_COOKIE: &str = "access_token";

/// JWT claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub is_key_user: bool,
    pub exp: usize,
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::new(), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"$");
    hasher.update(password.as_bytes());
    to_hex(&hasher.finalize())
}

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> String {
    let salt = to_hex(&rand::random::<[u8; 16]>());
    format!("v1${}${}", salt, digest(&salt, password))
}

/// Verify a password against its stored hash
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("v1"), Some(salt), Some(expected)) => digest(salt, password) == expected,
        _ => false,
    }
}

/// Issue an access token for a user
pub fn issue_token(secret: &str, user: &UserInfo) -> crate::Result<String> {
    let exp = chrono::Utc::now().timestamp() + TOKEN_TTL_SECS;
    let claims = Claims {
        sub: user.username.clone(),
        is_key_user: user.is_key_user,
        exp: exp as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Token encoding failed: {}", e)))
}

/// Decode and validate an access token
pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        pair.trim()
            .strip_prefix(TOKEN_COOKIE)?
            .strip_prefix('=')
            .map(|t| t.to_string())
    })
}

/// Authenticated principal
pub struct AuthUser(pub UserInfo);

/// Authenticated key user (elevated principal)
pub struct KeyUser(pub UserInfo);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| cookie_token(&parts.headers))
            .ok_or_else(|| Error::Unauthorized("Not authenticated".to_string()))?;

        let claims = decode_token(&state.config.jwt_secret, &token)
            .ok_or_else(|| Error::Unauthorized("Could not validate credentials".to_string()))?;

        // The token may outlive the account; re-check the store.
        let user = state
            .users
            .get(&claims.sub)
            .await?
            .ok_or_else(|| Error::Unauthorized("Could not validate credentials".to_string()))?;

        Ok(AuthUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for KeyUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;

        if !user.is_key_user {
            return Err(Error::Forbidden(
                "Not enough permissions. Key user required.".to_string(),
            ));
        }

        Ok(KeyUser(user))
    }
}
