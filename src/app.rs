//! Router assembly.
//!
//! Public: `/health`, `/api/login`, `/api/logout`. Everything else sits behind
//! the auth gate, including any routes the caller plugs in.

use crate::auth::{api as auth_api, auth_middleware, AuthState};
use crate::middleware::request_logging;
use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

/// Auth endpoints plus `/api/me`, with no extra protected routes.
pub fn router(state: AuthState) -> Router {
    router_with(state, Router::new())
}

/// Auth endpoints, with `protected` mounted behind the gate.
///
/// Handlers in `protected` can take an [`Identity`](crate::auth::Identity)
/// argument to learn who is calling.
pub fn router_with(state: AuthState, protected: Router) -> Router {
    let gate = state.gate.clone();

    let auth_routes = Router::new()
        .route("/api/login", post(auth_api::login))
        .route("/api/logout", post(auth_api::logout))
        .with_state(state);

    let protected_routes = protected
        .route("/api/me", get(auth_api::me))
        .route_layer(middleware::from_fn_with_state(gate, auth_middleware));

    let public_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(auth_routes)
        .layer(middleware::from_fn(request_logging))
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
