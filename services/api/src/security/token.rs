//! services/api/src/security/token.rs
//!
//! Issues and verifies the signed, time-bounded bearer tokens handed out on login.
//!
//! Both tokens are HS256 JWTs sharing the login's correlation id as `jti`. The
//! refresh token only becomes valid (`nbf`) once the access token has expired.

use accounts_core::domain::{SessionTokens, TokenClaims};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("empty secret")]
    EmptySecret,
    #[error("invalid token lifetime: {0}")]
    InvalidTtl(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
}

/// Source of the current time, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wire form of the claims.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nbf: Option<i64>,
    jti: String,
}

//=========================================================================================
// The Issuer
//=========================================================================================

#[derive(Clone)]
pub struct TokenIssuer {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    /// Creates an issuer signing with `secret`. An empty secret is refused rather
    /// than replaced by a default.
    pub fn new(
        issuer: impl Into<String>,
        secret: &str,
        access_ttl: std::time::Duration,
        refresh_ttl: std::time::Duration,
    ) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        let access_ttl = Duration::from_std(access_ttl).map_err(|e| TokenError::InvalidTtl(e.to_string()))?;
        let refresh_ttl = Duration::from_std(refresh_ttl).map_err(|e| TokenError::InvalidTtl(e.to_string()))?;

        Ok(Self {
            issuer: issuer.into(),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Signs an access token and its successor refresh token for `account_id`.
    pub fn issue_session_tokens(&self, account_id: Uuid, correlation_id: &str) -> Result<SessionTokens, TokenError> {
        // JWT timestamps are whole seconds.
        let now = self.clock.now().timestamp();
        let access_exp = now
            .checked_add(self.access_ttl.num_seconds())
            .ok_or_else(|| TokenError::Signing("access expiry overflows".to_string()))?;
        let refresh_exp = now
            .checked_add(self.refresh_ttl.num_seconds())
            .ok_or_else(|| TokenError::Signing("refresh expiry overflows".to_string()))?;

        let access = Claims {
            iss: self.issuer.clone(),
            sub: account_id.to_string(),
            iat: now,
            exp: access_exp,
            nbf: None,
            jti: correlation_id.to_string(),
        };
        let refresh = Claims {
            iss: self.issuer.clone(),
            sub: account_id.to_string(),
            iat: now,
            exp: refresh_exp,
            nbf: Some(access_exp),
            jti: correlation_id.to_string(),
        };

        Ok(SessionTokens {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
        })
    }

    /// Checks signature, issuer and the time window of `token`.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time claims are checked below against the injected clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| TokenError::InvalidToken)?
            .claims;

        let now = self.clock.now().timestamp();
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.nbf.is_some_and(|nbf| now < nbf) {
            return Err(TokenError::NotYetValid);
        }

        let subject = Uuid::parse_str(&claims.sub).map_err(|_| TokenError::InvalidToken)?;
        Ok(TokenClaims {
            issuer: claims.iss,
            subject,
            issued_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
            not_before: claims.nbf.map(timestamp).transpose()?,
            jti: claims.jti,
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    Utc.timestamp_opt(secs, 0).single().ok_or(TokenError::InvalidToken)
}
