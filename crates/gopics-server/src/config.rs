use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::warn;

use gopics_crypto::Keyring;
use gopics_crypto::keys::{generate_key, key_from_base64};
use gopics_db::PoolConfig;

/// Sample values from `.env.example` that must never reach production.
const PLACEHOLDER_KEYS: &[&str] = &[
    "change-me-to-a-base64-hash-key",
    "change-me-to-a-base64-block-key",
];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub hash_key: Option<Vec<u8>>,
    pub block_key: Option<Vec<u8>>,
    pub pool: PoolConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        let host = var("GOPICS_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse(var("GOPICS_PORT"), "GOPICS_PORT", 8080)?;
        let db_path = var("GOPICS_DB_PATH").unwrap_or_else(|| "gopics.db".into()).into();
        let media_dir = var("GOPICS_MEDIA_DIR").unwrap_or_else(|| "./media".into()).into();

        let hash_key = key(var("GOPICS_HASH_KEY"), "GOPICS_HASH_KEY")?;
        let block_key = key(var("GOPICS_BLOCK_KEY"), "GOPICS_BLOCK_KEY")?;

        let defaults = PoolConfig::default();
        let wait_secs: u64 = parse(var("GOPICS_POOL_WAIT_SECS"), "GOPICS_POOL_WAIT_SECS", 5)?;
        let pool = PoolConfig {
            max_idle: parse(var("GOPICS_POOL_MAX_IDLE"), "GOPICS_POOL_MAX_IDLE", defaults.max_idle)?,
            max_open: parse(var("GOPICS_POOL_MAX_OPEN"), "GOPICS_POOL_MAX_OPEN", defaults.max_open)?,
            wait_timeout: (wait_secs > 0).then(|| Duration::from_secs(wait_secs)),
            ..defaults
        };
        if pool.max_open == 0 {
            bail!("GOPICS_POOL_MAX_OPEN must be at least 1");
        }

        Ok(Self {
            host,
            port,
            db_path,
            media_dir,
            hash_key,
            block_key,
            pool,
        })
    }

    /// Cookie keys. Without a configured hash key a random one is used, so
    /// sessions do not survive a restart.
    pub fn keyring(&self) -> anyhow::Result<Keyring> {
        let hash_key = match &self.hash_key {
            Some(key) => key.clone(),
            None => {
                warn!("GOPICS_HASH_KEY is unset; using a random key, sessions end on restart");
                generate_key(64)
            }
        };
        if self.block_key.is_none() {
            warn!("GOPICS_BLOCK_KEY is unset; session cookies are signed but not encrypted");
        }

        Keyring::new(&hash_key, self.block_key.as_deref()).context("invalid cookie key")
    }
}

fn parse<T: std::str::FromStr>(value: Option<String>, name: &str, default: T) -> anyhow::Result<T> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{name} has an invalid value: {v:?}")),
    }
}

fn key(value: Option<String>, name: &str) -> anyhow::Result<Option<Vec<u8>>> {
    let Some(value) = value else {
        return Ok(None);
    };
    if PLACEHOLDER_KEYS.contains(&value.trim()) {
        bail!("{name} is still a placeholder; generate a real key and restart");
    }
    let key = key_from_base64(&value).with_context(|| format!("{name} is not valid base64"))?;
    Ok(Some(key))
}
