//! Authentication Middleware
//! Mission: Protect API endpoints with bearer token validation

use crate::auth::{jwt::TokenValidator, models::Identity};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use std::sync::Arc;
use tracing::warn;

/// Request-boundary guard: bearer extraction + token verification.
#[derive(Clone)]
pub struct AuthGate {
    validator: Arc<TokenValidator>,
}

impl AuthGate {
    pub fn new(validator: Arc<TokenValidator>) -> Self {
        Self { validator }
    }

    /// Resolve the caller's identity from request headers.
    ///
    /// The validator is never consulted when the header is absent or malformed.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<Identity, GateError> {
        let token = extract_bearer(headers)?;

        match self.validator.verify(&token) {
            Ok(claims) => Ok(Identity::from(claims)),
            Err(kind) => {
                warn!(reason = kind.as_str(), "Rejected bearer token");
                Err(GateError::InvalidToken)
            }
        }
    }
}

/// Pull the token out of a single `Authorization: Bearer <token>` header.
pub fn extract_bearer(headers: &HeaderMap) -> Result<String, GateError> {
    let mut values = headers.get_all(header::AUTHORIZATION).iter();
    if values.next().is_none() {
        return Err(GateError::MissingToken);
    }
    if values.next().is_some() {
        return Err(GateError::InvalidFormat);
    }

    let auth = headers
        .typed_try_get::<Authorization<Bearer>>()
        .map_err(|_| GateError::InvalidFormat)?
        .ok_or(GateError::MissingToken)?;

    let token = auth.token().trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(GateError::InvalidFormat);
    }

    Ok(token.to_string())
}

/// Auth middleware that validates bearer tokens and stores the caller's [`Identity`].
pub async fn auth_middleware(
    State(gate): State<AuthGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, GateError> {
    let identity = gate.authorize(req.headers())?;

    // Handlers read this through the `Identity` extractor
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(GateError::MissingToken)
    }
}

/// Gate rejection. Every variant is a 401; token failures share one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    MissingToken,
    InvalidFormat,
    InvalidToken,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let message = match self {
            GateError::MissingToken => "Missing authorization token",
            GateError::InvalidFormat => "Invalid authorization format. Use: Bearer {token}",
            GateError::InvalidToken => "Invalid or expired token",
        };

        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer")],
            message,
        )
            .into_response()
    }
}
