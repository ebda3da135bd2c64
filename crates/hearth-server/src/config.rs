use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use hearth_gateway::connection::DEFAULT_OUTBOX_CAPACITY;
use hearth_gateway::dispatcher::DEFAULT_FEED_CAPACITY;

/// Secrets that ship in docs and sample `.env` files.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "",
    "change-me",
    "changeme",
    "secret",
    "dev-secret-change-me",
    "CHANGE_ME_TO_A_RANDOM_STRING",
];

const DEFAULT_MAX_ARTIFACT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub storage_dir: PathBuf,
    pub public_url: String,
    pub max_artifact_bytes: usize,
    pub feed_capacity: usize,
    /// Per-connection queue of gateway events awaiting a slow client.
    pub gateway_outbox_capacity: usize,
}

impl ServerConfig {
    /// Reads `HEARTH_*` variables. Call `dotenvy::dotenv()` first.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = lookup("HEARTH_JWT_SECRET").unwrap_or_default();
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.trim()) {
            bail!("HEARTH_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let port = get("HEARTH_PORT", "3000")
            .parse()
            .context("HEARTH_PORT must be a port number")?;
        let max_artifact_bytes = match lookup("HEARTH_MAX_ARTIFACT_BYTES") {
            Some(v) => v.parse().context("HEARTH_MAX_ARTIFACT_BYTES must be a byte count")?,
            None => DEFAULT_MAX_ARTIFACT_BYTES,
        };
        let feed_capacity: usize = match lookup("HEARTH_FEED_CAPACITY") {
            Some(v) => v.parse().context("HEARTH_FEED_CAPACITY must be a number")?,
            None => DEFAULT_FEED_CAPACITY,
        };
        if feed_capacity == 0 {
            bail!("HEARTH_FEED_CAPACITY must be at least 1");
        }
        let gateway_outbox_capacity: usize = match lookup("HEARTH_GATEWAY_OUTBOX") {
            Some(v) => v.parse().context("HEARTH_GATEWAY_OUTBOX must be a number")?,
            None => DEFAULT_OUTBOX_CAPACITY,
        };
        if gateway_outbox_capacity == 0 {
            bail!("HEARTH_GATEWAY_OUTBOX must be at least 1");
        }

        Ok(Self {
            host: get("HEARTH_HOST", "0.0.0.0"),
            port,
            db_path: PathBuf::from(get("HEARTH_DB_PATH", "hearth.db")),
            jwt_secret,
            storage_dir: PathBuf::from(get("HEARTH_STORAGE_DIR", "./artifacts")),
            public_url: get("HEARTH_PUBLIC_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            max_artifact_bytes,
            feed_capacity,
            gateway_outbox_capacity,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
