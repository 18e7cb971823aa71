//! Authentication Models
//! Mission: Define credential, token and identity data structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Username/secret pair loaded from configuration.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String, // never serialize
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String, // subject (username)
    pub jti: String, // token id, unique per issuance
    pub iat: i64,    // issued-at, unix seconds
    pub exp: i64,    // expiration, unix seconds
}

impl Claims {
    pub fn is_expired_at(&self, now_ts: i64) -> bool {
        now_ts >= self.exp
    }
}

/// Verified caller identity, attached to the request by the auth gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub subject: String,
    pub token_id: String,
    pub expires_at: i64,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            token_id: claims.jti,
            expires_at: claims.exp,
        }
    }
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64, // seconds until expiration
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
