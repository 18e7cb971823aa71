//! tokengate - bearer token gate in front of a resource API
//! Mission: Issue, verify and revoke short-lived signed credentials

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokengate::{
    app,
    auth::{
        spawn_pruner, AuthState, Clock, CredentialStore, RevocationRegistry, SigningKey,
        SystemClock, TokenIssuer, TokenValidator,
    },
    config::{Cli, GateConfig},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    load_env();
    init_tracing();

    let cli = Cli::parse();
    let config_path = cli.config.clone();
    let config = GateConfig::load(cli)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    info!("🚀 tokengate starting");
    info!(
        "⏱️  Token TTL {}s, revocation sweep every {}s",
        config.token_ttl.as_secs(),
        config.prune_interval.as_secs()
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let key = SigningKey::from_secret(&config.jwt_secret).context("Signing key unavailable")?;

    if config.users.is_empty() {
        warn!("⚠️  No users in {} - every login will fail", config_path.display());
    }
    let credentials = Arc::new(CredentialStore::new(config.users)?);

    let revocations = Arc::new(RevocationRegistry::new(clock.clone()));
    let issuer = Arc::new(TokenIssuer::new(key.clone(), config.token_ttl, clock.clone()));
    let validator = Arc::new(TokenValidator::new(key, revocations.clone(), clock));
    let auth_state = AuthState::new(credentials, issuer, validator);

    // Keep the denylist bounded to live revoked tokens.
    spawn_pruner(revocations, config.prune_interval);

    let app = app::router(auth_state).layer(CorsLayer::permissive());

    // Start server
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🎯 API server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Initialize tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tokengate=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate directory when launched from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
