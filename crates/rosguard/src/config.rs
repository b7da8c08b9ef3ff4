use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Environment variable that overrides the configured router password.
pub const PASSWORD_ENV: &str = "ROSGUARD_PASSWORD";

#[derive(Debug, Serialize, Deserialize)]
pub struct RosguardToml {
    pub router: RouterEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouterEntry {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_tls")]
    pub tls: bool,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// RouterOS ships a self-signed certificate for www-ssl.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_port() -> u16 {
    443
}

fn default_tls() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

impl RouterEntry {
    /// Replace the password with `value` when one is given.
    pub fn apply_password_override(&mut self, value: Option<String>) {
        if let Some(password) = value {
            debug!("router password taken from environment");
            self.password = Some(password);
        }
    }
}

pub async fn load(path: &Path) -> Result<RosguardToml, ConfigError> {
    debug!(path = %path.display(), "loading config");

    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "config file not found");
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        Err(e) => return Err(ConfigError::Read(e)),
    };

    let mut config: RosguardToml = toml::from_str(&contents)?;
    config
        .router
        .apply_password_override(std::env::var(PASSWORD_ENV).ok());
    validate(&config)?;

    info!(
        path = %path.display(),
        host = %config.router.host,
        port = config.router.port,
        tls = config.router.tls,
        "loaded config"
    );
    Ok(config)
}

pub async fn save(path: &Path, config: &RosguardToml) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let contents = toml::to_string_pretty(config)?;
    tokio::fs::write(path, contents).await?;
    info!(path = %path.display(), host = %config.router.host, "saved config");
    Ok(())
}

pub fn validate(config: &RosguardToml) -> Result<(), ConfigError> {
    let router = &config.router;
    if router.host.trim().is_empty() {
        return Err(ConfigError::Invalid("router.host must not be empty"));
    }
    if router.username.trim().is_empty() {
        return Err(ConfigError::Invalid("router.username must not be empty"));
    }
    if router.port == 0 {
        return Err(ConfigError::Invalid("router.port must not be 0"));
    }
    Ok(())
}
