//! Session token codec
//!
//! Tokens are compact HS256 JWTs carrying `{sub: {email, name, picture}, iat, exp}`
//! with a fixed seven day lifetime. They are stateless: validity is signature plus
//! expiry, nothing is persisted server-side.
//!
//! `jsonwebtoken`'s own claim validation expects `sub` to be a string, so decoding
//! verifies the signature through `jsonwebtoken::crypto` and checks `exp` here,
//! against a caller-supplied clock.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{crypto, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header};
use thiserror::Error;

use super::models::{Claims, SessionSubject};

/// Lifetime of every issued session token
pub const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("failed to encode token: {0}")]
    Encoding(String),
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, subject: SessionSubject) -> Result<String, TokenError> {
        self.issue_at(subject, Utc::now())
    }

    pub fn issue_at(&self, subject: SessionSubject, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject,
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode_at(token, Utc::now())
    }

    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let header = decode_header(token).map_err(|_| TokenError::InvalidToken)?;
        if header.alg != Algorithm::HS256 {
            return Err(TokenError::InvalidToken);
        }

        let (message, signature) = token.rsplit_once('.').ok_or(TokenError::InvalidToken)?;
        let (_, payload) = message.split_once('.').ok_or(TokenError::InvalidToken)?;

        let valid = crypto::verify(signature, message.as_bytes(), &self.decoding_key, Algorithm::HS256)
            .map_err(|_| TokenError::InvalidToken)?;
        if !valid {
            return Err(TokenError::InvalidToken);
        }

        let raw = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::InvalidToken)?;
        let claims: Claims = serde_json::from_slice(&raw).map_err(|_| TokenError::InvalidToken)?;

        if now.timestamp() >= claims.exp {
            return Err(TokenError::TokenExpired);
        }

        Ok(claims)
    }
}
