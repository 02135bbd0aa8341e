//! Configuration for zstored

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Environment variable prefix, e.g. `ZSTORE_POOL=tank`
pub const ENV_PREFIX: &str = "ZSTORE";

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bind address for the HTTP API
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Name of the pool volumes are carved from
    #[serde(default = "default_pool")]
    pub pool: String,

    /// Route prefix of the storage API
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Storage backend
    #[serde(default)]
    pub backend: BackendKind,

    /// Capacity of the memory backend, in bytes
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: u64,

    /// Largest accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Grace period for in-flight requests after a shutdown signal
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Zfs,
    Memory,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Zfs => write!(f, "zfs"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}
fn default_pool() -> String {
    "zstore".to_string()
}
fn default_api_prefix() -> String {
    "/v1/storage".to_string()
}
fn default_memory_capacity() -> u64 {
    16 * 1024 * 1024 * 1024
}
fn default_max_body_bytes() -> usize {
    4096
}
fn default_shutdown_timeout() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            pool: default_pool(),
            api_prefix: default_api_prefix(),
            backend: BackendKind::default(),
            memory_capacity: default_memory_capacity(),
            max_body_bytes: default_max_body_bytes(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then `ZSTORE_*`
    /// environment variables. Missing keys fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: Config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the naming scheme cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.pool.is_empty() || self.pool.contains('/') {
            return Err(Error::InvalidConfig(format!(
                "pool name must be a single non-empty segment, got {:?}",
                self.pool
            )));
        }

        if !self.api_prefix.starts_with('/')
            || (self.api_prefix.len() > 1 && self.api_prefix.ends_with('/'))
        {
            return Err(Error::InvalidConfig(format!(
                "api_prefix must start with '/' and not end with one, got {:?}",
                self.api_prefix
            )));
        }

        if self.max_body_bytes == 0 {
            return Err(Error::InvalidConfig("max_body_bytes must be positive".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pool, "zstore");
        assert_eq!(config.api_prefix, "/v1/storage");
        assert_eq!(config.backend, BackendKind::Zfs);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "pool = 'tank'\nbackend = 'memory'\nbind_addr = '127.0.0.1:7000'\nmemory_capacity = 1024"
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.pool, "tank");
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.bind_addr, "127.0.0.1:7000".parse().unwrap());
        assert_eq!(config.memory_capacity, 1024);
        assert_eq!(config.api_prefix, "/v1/storage");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = Config::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_pool_name() {
        let mut config = Config::default();
        config.pool = "tank/zstore".into();
        assert!(config.validate().is_err());

        config.pool = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_prefix() {
        let mut config = Config::default();
        config.api_prefix = "v1/storage".into();
        assert!(config.validate().is_err());

        config.api_prefix = "/v1/storage/".into();
        assert!(config.validate().is_err());

        config.api_prefix = "/storage".into();
        assert!(config.validate().is_ok());
    }
}
