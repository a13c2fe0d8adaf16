use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::Claims;
use crate::config::JwtConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token carries no usable subject")]
    MissingSubject,
}

/// Signing and verification keys, built once from config at startup.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub algorithm: Algorithm,
    pub ttl: TimeDuration,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            algorithm: cfg.algorithm,
            ttl: TimeDuration::minutes(cfg.ttl_minutes),
        }
    }

    /// Issues a token for `subject_id` with the configured lifetime.
    pub fn issue(&self, subject_id: i64) -> anyhow::Result<String> {
        self.issue_with_ttl(subject_id, self.ttl)
    }

    pub fn issue_with_ttl(&self, subject_id: i64, ttl: TimeDuration) -> anyhow::Result<String> {
        self.issue_at(subject_id, ttl, OffsetDateTime::now_utc())
    }

    pub(crate) fn issue_at(
        &self,
        subject_id: i64,
        ttl: TimeDuration,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let claims = Claims {
            sub: Some(subject_id.to_string()),
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)?;
        debug!(user_id = subject_id, "jwt signed");
        Ok(token)
    }

    /// Verifies signature and algorithm, then expiry, and returns the user id.
    pub fn validate(&self, token: &str) -> Result<i64, TokenError> {
        self.validate_at(token, OffsetDateTime::now_utc())
    }

    pub(crate) fn validate_at(&self, token: &str, now: OffsetDateTime) -> Result<i64, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        // expiry is compared against `now` below, with no leeway
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(classify)?;
        let claims = data.claims;

        if now.unix_timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        let user_id = claims
            .sub
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(TokenError::MissingSubject)?;
        debug!(user_id, "jwt verified");
        Ok(user_id)
    }
}

fn classify(e: jsonwebtoken::errors::Error) -> TokenError {
    match e.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::BadSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}
