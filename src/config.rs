//! Configuration
//! Mission: Resolve CLI flags, environment and the config file into one startup config
//!
//! Precedence: flag / environment variable > config file > default.

use crate::auth::{errors::AuthError, models::Credential};
use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
/// Upper bound on the token lifetime (7 days).
pub const MAX_TOKEN_TTL_SECS: u64 = 7 * 24 * 3600;

#[derive(Debug, Parser)]
#[command(name = "tokengate")]
#[command(about = "Bearer-token gate: login, logout and verified identity for a resource API")]
pub struct Cli {
    /// Path to the TOML config file (users, optional [server] and [jwt] sections)
    #[arg(long, env = "TOKENGATE_CONFIG", default_value = "config.toml")]
    pub config: PathBuf,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on (overrides [server].port)
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// HMAC signing secret (overrides [jwt].secret)
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Token time-to-live in seconds (overrides [jwt].ttl_secs)
    #[arg(long, env = "TOKEN_TTL_SECS")]
    pub token_ttl_secs: Option<u64>,

    /// How often expired revocations are swept, in seconds
    #[arg(long, env = "REVOCATION_PRUNE_SECS", default_value = "60")]
    pub prune_interval_secs: u64,
}

/// On-disk config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerSection,
    pub jwt: JwtSection,
    pub users: Vec<Credential>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: Option<u16>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct JwtSection {
    pub secret: Option<String>,
    pub ttl_secs: Option<u64>,
}

impl fmt::Debug for JwtSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSection")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse TOML")
    }
}

/// Fully resolved startup configuration.
pub struct GateConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub prune_interval: Duration,
    pub users: Vec<Credential>,
}

impl fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("prune_interval", &self.prune_interval)
            .field("users", &self.users.len())
            .finish()
    }
}

impl GateConfig {
    /// Read the config file named by `cli` and merge it with the flags.
    pub fn load(cli: Cli) -> Result<Self> {
        let file = FileConfig::load(&cli.config)?;
        Self::resolve(cli, file)
    }

    pub fn resolve(cli: Cli, file: FileConfig) -> Result<Self> {
        let jwt_secret = non_blank(cli.jwt_secret)
            .or_else(|| non_blank(file.jwt.secret))
            .ok_or(AuthError::SigningKeyUnavailable)
            .context("Set JWT_SECRET or [jwt].secret")?;

        let ttl_secs = cli
            .token_ttl_secs
            .or(file.jwt.ttl_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        if ttl_secs == 0 {
            bail!("Token TTL must be greater than zero");
        }
        if ttl_secs > MAX_TOKEN_TTL_SECS {
            bail!(
                "Token TTL of {}s exceeds the maximum of {}s",
                ttl_secs,
                MAX_TOKEN_TTL_SECS
            );
        }

        if cli.prune_interval_secs == 0 {
            bail!("Revocation prune interval must be greater than zero");
        }

        let port = cli.port.or(file.server.port).unwrap_or(DEFAULT_PORT);

        Ok(Self {
            bind_addr: format!("{}:{}", cli.host, port),
            jwt_secret,
            token_ttl: Duration::from_secs(ttl_secs),
            prune_interval: Duration::from_secs(cli.prune_interval_secs),
            users: file.users,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
