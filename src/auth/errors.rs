//! Authentication Errors
//! Mission: One taxonomy for credential, signing and token failures

use thiserror::Error;

/// Why a bearer token was rejected.
///
/// Variants are listed in the order the validator checks them. The kind is
/// for operators only; callers always see a uniform unauthorized response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature or algorithm is invalid")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token has been revoked")]
    Revoked,
}

impl TokenError {
    /// Short label used as the `reason` field in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::BadSignature => "bad_signature",
            TokenError::Expired => "expired",
            TokenError::Revoked => "revoked",
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("no credentials are loaded")]
    NoCredentialsLoaded,
    #[error("signing key is not configured")]
    SigningKeyUnavailable,
    #[error("token lifetime overflows the expiry timestamp")]
    InvalidTokenLifetime,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}
