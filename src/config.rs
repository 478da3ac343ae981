//! Layered configuration: built-in defaults, then an optional
//! `filedock.toml` in the working directory, then `FILEDOCK_*` environment
//! variables.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::AppError;

pub const DEFAULT_MAX_UPLOAD_MB: u64 = 10 * 1024;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Address the HTTP listener binds to.
    pub bind_address: String,
    pub port: u16,

    /// Every API path is resolved against this directory.
    pub sandbox_root: String,

    /// SQLite file holding bookmark records.
    pub database_path: String,

    /// Fixed caller identity; no authentication is performed.
    pub default_user: String,

    /// Request body limit for uploads, in MB.
    pub max_upload_mb: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, AppError> {
        Self::load_from("filedock")
    }

    pub fn load_from(file: &str) -> Result<Self, AppError> {
        let settings = Config::builder()
            .set_default("bind_address", "127.0.0.1")?
            .set_default("port", 3000)?
            .set_default("sandbox_root", "data")?
            .set_default("database_path", "db/filedock.sqlite3")?
            .set_default("default_user", "default")?
            .set_default("max_upload_mb", DEFAULT_MAX_UPLOAD_MB)?
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix("FILEDOCK"))
            .build()?;
        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.port == 0 {
            return Err(config::ConfigError::Message("port cannot be 0".into()));
        }
        if self.sandbox_root.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "sandbox_root cannot be empty".into(),
            ));
        }
        if self.database_path.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "database_path cannot be empty".into(),
            ));
        }
        if self.default_user.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "default_user cannot be empty".into(),
            ));
        }
        if self.max_upload_mb == 0 {
            return Err(config::ConfigError::Message(
                "max_upload_mb must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| AppError::General(format!("invalid bind address: {e}")))
    }

    pub fn sandbox_root_path(&self) -> PathBuf {
        PathBuf::from(&self.sandbox_root)
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path)
    }

    /// Saturates at `usize::MAX` where the byte count does not fit.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb
            .saturating_mul(1024 * 1024)
            .try_into()
            .unwrap_or(usize::MAX)
    }
}
