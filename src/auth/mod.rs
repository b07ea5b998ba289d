//! Session tokens and password hashing.
//!
//! A session is a stateless HS256 JWT carried in the `token` cookie. Nothing
//! about it is stored server-side: a token is good until it expires, and
//! [`authenticate`] resolves it to the user it was issued for.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::fmt;

use crate::db::User;
use crate::error::{Error, Result};

/// Name of the cookie carrying the session token
pub const TOKEN_COOKIE: &str = "token";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    #[serde(rename = "_id")]
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies session tokens with the configured secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl_days", &self.ttl.num_days())
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_days: u32) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::days(ttl_days as i64),
        }
    }

    pub fn issue(&self, user_id: &str) -> Result<String> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issue a token as if signed at `now`
    pub fn issue_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<String> {
        let claims = SessionClaims {
            user_id: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(Error::TokenSigning)
    }

    /// Check signature, format and expiry
    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected session token");
                Error::InvalidCredential
            })
    }
}

/// Resolve a session token to its user.
///
/// No token is [`Error::MissingCredential`]; a token that fails
/// verification is [`Error::InvalidCredential`]; a valid token for a user
/// that no longer exists is [`Error::UnknownUser`].
pub async fn authenticate(db: &SqlitePool, issuer: &TokenIssuer, token: Option<&str>) -> Result<User> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(Error::MissingCredential)?;

    let claims = issuer.verify(token)?;

    User::get_by_id(db, &claims.user_id)
        .await?
        .ok_or(Error::UnknownUser)
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}
