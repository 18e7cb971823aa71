//! Authentication API Endpoints
//! Mission: Provide login, logout and identity endpoints

use crate::auth::{
    credential_store::CredentialStore,
    errors::AuthError,
    jwt::{TokenIssuer, TokenValidator},
    middleware::{extract_bearer, AuthGate},
    models::{Identity, LoginRequest, LoginResponse, MessageResponse},
    revocation::RevocationRegistry,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub credentials: Arc<CredentialStore>,
    pub issuer: Arc<TokenIssuer>,
    pub validator: Arc<TokenValidator>,
    pub gate: AuthGate,
}

impl AuthState {
    pub fn new(
        credentials: Arc<CredentialStore>,
        issuer: Arc<TokenIssuer>,
        validator: Arc<TokenValidator>,
    ) -> Self {
        let gate = AuthGate::new(validator.clone());
        Self {
            credentials,
            issuer,
            validator,
            gate,
        }
    }

    pub fn revocations(&self) -> &Arc<RevocationRegistry> {
        self.validator.revocations()
    }
}

/// Login endpoint - POST /api/login
pub async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthApiError> {
    if payload.username.is_empty() || payload.password.is_empty() {
        warn!("❌ Login rejected: username and password are required");
        return Err(AuthApiError::InvalidCredentials);
    }

    info!("🔐 Login attempt: {}", payload.username);

    match state
        .credentials
        .authenticate(&payload.username, &payload.password)
    {
        Ok(true) => {}
        Ok(false) => {
            warn!("❌ Failed login attempt: {}", payload.username);
            return Err(AuthApiError::InvalidCredentials);
        }
        Err(AuthError::NoCredentialsLoaded) => {
            error!("Login impossible: no credentials are loaded (check the config file)");
            return Err(AuthApiError::InvalidCredentials);
        }
        Err(e) => {
            error!("Credential check failed: {}", e);
            return Err(AuthApiError::InternalError);
        }
    }

    let issued = state.issuer.issue(&payload.username).map_err(|e| {
        error!("Failed to issue token for {}: {}", payload.username, e);
        AuthApiError::InternalError
    })?;

    info!(
        token_id = %issued.claims.jti,
        "✅ Login successful: {}",
        payload.username
    );

    Ok(Json(LoginResponse {
        token: issued.token,
        token_type: "Bearer".to_string(),
        expires_in: issued.claims.exp - issued.claims.iat,
    }))
}

/// Logout endpoint - POST /api/logout
///
/// Accepts any token with a valid structure and signature, including one at or
/// past its expiry, and denylists its id until it would have expired.
pub async fn logout(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AuthApiError> {
    let token = extract_bearer(&headers).map_err(|_| AuthApiError::MissingBearer)?;

    let claims = state.validator.verify_for_revocation(&token).map_err(|kind| {
        warn!(reason = kind.as_str(), "Rejected token on logout");
        AuthApiError::InvalidLogoutToken
    })?;

    let now = state.validator.clock().now_ts();
    if claims.is_expired_at(now) {
        debug!(token_id = %claims.jti, "Logout with an already expired token");
    } else {
        state.revocations().add(&claims.jti, claims.exp);
    }

    info!(token_id = %claims.jti, "👋 Logout: {}", claims.sub);

    Ok(Json(MessageResponse {
        message: "logout successful".to_string(),
    }))
}

/// Current identity - GET /api/me (behind the auth gate)
pub async fn me(identity: Identity) -> Json<Identity> {
    Json(identity)
}

/// Auth API error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthApiError {
    InvalidCredentials,
    MissingBearer,
    InvalidLogoutToken,
    InternalError,
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid username or password")
            }
            AuthApiError::MissingBearer => (
                StatusCode::UNAUTHORIZED,
                "Missing or invalid Authorization header",
            ),
            AuthApiError::InvalidLogoutToken => {
                (StatusCode::UNAUTHORIZED, "Invalid token for logout")
            }
            AuthApiError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        match self {
            // Same challenge the auth gate sends for bearer failures.
            AuthApiError::MissingBearer | AuthApiError::InvalidLogoutToken => (
                status,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                message,
            )
                .into_response(),
            _ => (status, message).into_response(),
        }
    }
}
