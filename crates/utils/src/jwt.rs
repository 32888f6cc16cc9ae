//! HS256 tokens for sessions, refresh and password reset.

use std::fmt;

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifetime of the token handed out on register/login.
pub const SESSION_TOKEN_TTL: Duration = Duration::days(7);
/// Lifetime of the access token minted from a refresh token.
pub const ACCESS_TOKEN_TTL: Duration = Duration::minutes(15);
pub const REFRESH_TOKEN_TTL: Duration = Duration::days(7);
pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Reset,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::Reset => "reset",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub kind: TokenKind,
    /// Unique per token so two tokens minted in the same second differ.
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("failed to sign token: {0}")]
    Encode(jsonwebtoken::errors::Error),
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(jsonwebtoken::errors::Error),
    #[error("expected a {expected} token, got a {found} token")]
    WrongKind { expected: TokenKind, found: TokenKind },
}

/// A signed token together with its expiry, as stored for refresh tokens.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: chrono::DateTime<Utc>,
}

#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for JwtService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtService").finish_non_exhaustive()
    }
}

impl JwtService {
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<IssuedToken, JwtError> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = Claims {
            sub: user_id,
            kind,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token =
            encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(JwtError::Encode)?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Decode and validate `token`, accepting it only as a token of `expected` kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, JwtError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e),
            }
        })?;

        if data.claims.kind != expected {
            return Err(JwtError::WrongKind {
                expected,
                found: data.claims.kind,
            });
        }

        Ok(data.claims)
    }
}
