use anyhow::{Context, Result};
use chrono_tz::Tz;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::auth::ClientCredentials;
use crate::api::resilience::{RetryConfig, RetrySettings};

pub const ENV_BASE_URL: &str = "UNILY_BASE_URL";
pub const ENV_CLIENT_ID: &str = "UNILY_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "UNILY_CLIENT_SECRET";
pub const ENV_LOGS_DIR: &str = "UNILY_LOGS_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
    /// IANA zone used to date the journal files
    #[serde(default = "default_log_timezone")]
    pub log_timezone: String,
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_timezone() -> String {
    "Asia/Kolkata".to_string()
}

fn default_accept_invalid_certs() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            logs_dir: default_logs_dir(),
            log_timezone: default_log_timezone(),
            accept_invalid_certs: default_accept_invalid_certs(),
            retry: RetrySettings::default(),
        }
    }
}

impl SyncConfig {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            // Use XDG config directory on Linux
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("unily-sync")
        } else {
            // Use home directory with dot prefix on Windows/Mac
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".unily-sync")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load from `explicit` or the default location, then apply environment
    /// overrides (including those from a `.env` file).
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::get_config_path()?,
        };
        debug!("Loading config from: {:?}", config_path);

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?
        } else if explicit.is_some() {
            anyhow::bail!("Config file not found: {:?}", config_path);
        } else {
            info!("Config file doesn't exist, using defaults");
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid config TOML")
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config to TOML")
    }

    /// Override fields from `lookup` (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base_url) = non_empty(ENV_BASE_URL) {
            self.base_url = base_url;
        }
        if let Some(client_id) = non_empty(ENV_CLIENT_ID) {
            self.client_id = client_id;
        }
        if let Some(client_secret) = non_empty(ENV_CLIENT_SECRET) {
            self.client_secret = client_secret;
        }
        if let Some(logs_dir) = non_empty(ENV_LOGS_DIR) {
            self.logs_dir = PathBuf::from(logs_dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("base_url", &self.base_url),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            anyhow::bail!(
                "Missing configuration: {} (set them in the config file or via {}, {}, {})",
                missing.join(", "),
                ENV_BASE_URL,
                ENV_CLIENT_ID,
                ENV_CLIENT_SECRET
            );
        }

        self.timezone()?;
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.log_timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid log_timezone '{}': {}", self.log_timezone, e))
    }

    pub fn credentials(&self) -> ClientCredentials {
        ClientCredentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from(&self.retry)
    }

    /// Copy safe to print
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.client_secret.is_empty() {
            copy.client_secret = "[REDACTED]".to_string();
        }
        copy
    }
}
