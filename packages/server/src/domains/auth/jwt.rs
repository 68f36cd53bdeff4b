use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::IdentityId;

/// Session lifetime unless configured otherwise.
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 30;

/// JWT Claims - data stored in the token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,             // Subject (identity_id as string)
    pub identity_id: IdentityId, // Identity UUID
    pub iat: i64,                // Issued at timestamp
    pub exp: i64,                // Expiration timestamp
    pub iss: String,             // Issuer
    pub jti: String,             // JWT ID (unique token identifier)
}

/// A freshly minted session
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub identity_id: IdentityId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Bad signature, malformed, wrong issuer or expired. Not distinguished.
    #[error("invalid session")]
    Invalid,
    #[error("failed to sign session: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Mints and validates HS256 session tokens. No server-side revocation.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(secret: &str, issuer: String, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, identity_id: IdentityId) -> Result<Session, SessionError> {
        let issued_at = Utc::now();
        let expires_at = issued_at + self.ttl;

        let claims = Claims {
            sub: identity_id.to_string(),
            identity_id,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(Session {
            token,
            identity_id,
            issued_at,
            expires_at,
        })
    }

    /// Identity the token was issued for, if it is genuine and unexpired.
    pub fn validate(&self, token: &str) -> Result<IdentityId, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| SessionError::Invalid)?
            .claims;

        if claims.sub != claims.identity_id.to_string() {
            return Err(SessionError::Invalid);
        }
        Ok(claims.identity_id)
    }
}
