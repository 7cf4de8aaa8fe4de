use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub cache: CacheConfig,
    pub catalog: CatalogConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Directory holding `NAME.yang` / `NAME@REVISION.yang` source files.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub db_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to; also embedded in schema URLs.
    pub bind_address: String,
    pub bind_port: u16,
    #[serde(default = "default_resolve_timeout_secs")]
    pub resolve_timeout_secs: u64,
}

fn default_resolve_timeout_secs() -> u64 {
    60
}

impl ServerConfig {
    pub fn bind(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }

    /// Upper bound on a single schema resolution.
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate cache: a missing or non-directory cache folder is fatal at
    // startup, before anything is wired up.
    if !config.cache.dir.exists() {
        anyhow::bail!(
            "cache.dir does not exist: {}",
            config.cache.dir.display()
        );
    }
    if !config.cache.dir.is_dir() {
        anyhow::bail!(
            "cache.dir is not a directory: {}",
            config.cache.dir.display()
        );
    }

    // Validate server
    if config.server.bind_port == 0 {
        anyhow::bail!("server.bind_port must be > 0");
    }
    if config.server.resolve_timeout_secs == 0 {
        anyhow::bail!("server.resolve_timeout_secs must be >= 1");
    }

    Ok(config)
}
