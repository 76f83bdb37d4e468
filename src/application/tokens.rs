//! Signed, time-limited bearer tokens.
//!
//! Tokens are HS256 JWTs carrying the username as `sub` and an absolute `exp`.
//! The signing secret is fixed at construction and never mutated afterwards.
//! There is no revocation list: a token stays valid until it expires.

use std::fmt;
use std::sync::Arc;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed or carries an invalid signature")]
    MalformedOrInvalidSignature,
    #[error("token does not name a subject")]
    MissingSubject,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    keys: Arc<Keys>,
    ttl: Duration,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &ALGORITHM)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
            }),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        self.issue_at(subject, OffsetDateTime::now_utc())
    }

    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    /// Issue a token whose expiry is `now + ttl`.
    pub fn issue_at(&self, subject: &str, now: OffsetDateTime) -> Result<String, TokenError> {
        let claims = Claims {
            sub: Some(subject.to_string()),
            exp: (now + self.ttl).unix_timestamp(),
        };
        encode(&Header::new(ALGORITHM), &claims, &self.keys.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    /// Verify signature and structure, then reject tokens with `now >= exp`.
    pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<String, TokenError> {
        let mut validation = Validation::new(ALGORITHM);
        // expiry is checked below against the supplied clock, without leeway
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Claims>(token, &self.keys.decoding, &validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::MalformedOrInvalidSignature,
            }
        })?;

        if now.unix_timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        data.claims
            .sub
            .filter(|subject| !subject.is_empty())
            .ok_or(TokenError::MissingSubject)
    }
}
