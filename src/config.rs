//! Runtime configuration from environment variables
//!
//! The backing store path and the shared cache connection are injected through
//! the environment so deployments can point at different instances without a
//! rebuild. Everything has a local-development default.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Named locale assumption for currency parsing. Statement amounts are always
/// interpreted with Brazilian thousands/decimal separators; there is no
/// per-upload locale switch.
pub const BRL_LOCALE: &str = "pt-BR-currency";

/// Timeout applied to every shared-tier cache call so a degraded Redis
/// cannot stall request handling.
pub const SHARED_CACHE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path
    pub db_path: PathBuf,
    /// Redis connection URL; None disables the shared cache tier
    pub redis_url: Option<String>,
    /// TTL for structural hierarchy data (seconds)
    pub lookups_ttl_secs: u64,
    /// TTL for statistics data (seconds)
    pub statistics_ttl_secs: u64,
    /// TTL for dynamic lists and anything without a recognized kind (seconds)
    pub default_ttl_secs: u64,
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let db_path = match std::env::var("CONCILIA_DB") {
            Ok(path) => PathBuf::from(path),
            Err(_) => default_db_path()?,
        };

        let redis_url = std::env::var("CONCILIA_REDIS_URL").ok().filter(|s| !s.is_empty());

        Ok(Config {
            db_path,
            redis_url,
            lookups_ttl_secs: env_u64("CONCILIA_LOOKUPS_TTL", 3600),
            statistics_ttl_secs: env_u64("CONCILIA_STATISTICS_TTL", 60),
            default_ttl_secs: env_u64("CONCILIA_DEFAULT_TTL", 300),
        })
    }
}

/// Get the default database path (~/.concilia/data.db)
pub fn default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let concilia_dir = PathBuf::from(home).join(".concilia");

    std::fs::create_dir_all(&concilia_dir).context("Failed to create .concilia directory")?;

    Ok(concilia_dir.join("data.db"))
}

fn env_u64(var: &str, default: u64) -> u64 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
