//! Configuration for harvestgrid

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::error::MarketError;

/// Default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("harvestgrid")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the SQLite database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Database file name inside `data_dir`
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Interface to bind the HTTP API on
    #[serde(default = "default_bind_host")]
    pub bind_host: IpAddr,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Maximum pooled SQLite connections
    #[serde(default = "default_pool_size")]
    pub db_pool_size: u32,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_database_file() -> String {
    "harvestgrid.db".to_string()
}

fn default_bind_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_http_port() -> u16 {
    8095
}

fn default_pool_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            bind_host: default_bind_host(),
            http_port: default_http_port(),
            db_pool_size: default_pool_size(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MarketError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| MarketError::Config(e.to_string()))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), MarketError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| MarketError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> Result<(), MarketError> {
        if self.db_pool_size == 0 {
            return Err(MarketError::Config("db_pool_size must be at least 1".into()));
        }
        if self.database_file.trim().is_empty() {
            return Err(MarketError::Config("database_file must not be empty".into()));
        }
        Ok(())
    }

    /// Full path of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    /// Socket address for the HTTP API
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.http_port)
    }
}
