use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

pub const ENV_DATABASE_URL: &str = "MEMODB_DATABASE_URL";
pub const ENV_BUSY_TIMEOUT_MS: &str = "MEMODB_BUSY_TIMEOUT_MS";
pub const ENV_WAL: &str = "MEMODB_WAL";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Connection target, e.g. `sqlite:///cache.db`. `None` leaves the
    /// context unconnected.
    pub database_url: Option<String>,

    /// How long SQLite waits on a locked database before failing.
    pub busy_timeout_ms: u64,

    /// Use WAL journaling for file-backed databases (no-op in memory).
    pub wal: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            busy_timeout_ms: 5000,
            wal: true,
        }
    }
}

impl CacheConfig {
    /// Defaults overridden by `MEMODB_*` environment variables. Unparseable
    /// values are reported, not ignored.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        if let Ok(url) = env::var(ENV_DATABASE_URL) {
            if !url.trim().is_empty() {
                cfg.database_url = Some(url);
            }
        }
        if let Ok(raw) = env::var(ENV_BUSY_TIMEOUT_MS) {
            cfg.busy_timeout_ms = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_BUSY_TIMEOUT_MS}={raw:?} is not a number"))?;
        }
        if let Ok(raw) = env::var(ENV_WAL) {
            cfg.wal = parse_bool(&raw)
                .with_context(|| format!("{ENV_WAL}={raw:?} is not a boolean"))?;
        }
        Ok(cfg)
    }

    pub fn from_yaml_str(s: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(s).context("failed to parse cache config")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read cache config {}", path.display()))?;
        Self::from_yaml_str(&raw).with_context(|| format!("in {}", path.display()))
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
