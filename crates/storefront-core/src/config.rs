//! Client configuration management.
//!
//! This module handles loading the client configuration: backend
//! URL, toast lifetime, telemetry collector and where session data lives.
//!
//! Configuration is stored at `~/.config/storefront/config.json`. Selected
//! fields can be overridden through `STOREFRONT_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::notify::DEFAULT_TTL;

/// Application name used for config/data directory paths
const APP_NAME: &str = "storefront";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend the storefront talks to when nothing else is configured
const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

/// Telemetry request timeout in seconds.
/// Events are fire-and-forget, so a short timeout keeps tasks from piling up.
const DEFAULT_TELEMETRY_TIMEOUT_SECS: u64 = 5;

const ENV_TOAST_TTL_MS: &str = "STOREFRONT_TOAST_TTL_MS";
const ENV_TELEMETRY_ENDPOINT: &str = "STOREFRONT_TELEMETRY_ENDPOINT";
const ENV_TELEMETRY_TOKEN: &str = "STOREFRONT_TELEMETRY_TOKEN";
const ENV_STORAGE_DIR: &str = "STOREFRONT_STORAGE_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub endpoint: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_telemetry_timeout")]
    pub timeout_secs: u64,
}

fn default_telemetry_timeout() -> u64 {
    DEFAULT_TELEMETRY_TIMEOUT_SECS
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_toast_ttl_ms() -> u64 {
    DEFAULT_TTL.as_millis() as u64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_toast_ttl_ms")]
    pub toast_ttl_ms: u64,
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
    /// Overrides the platform data directory for the token store
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            toast_ttl_ms: default_toast_ttl_ms(),
            telemetry: None,
            storage_dir: None,
        }
    }
}

impl Config {
    /// Load the config file (or defaults) and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply `STOREFRONT_*` overrides using `lookup` to read variables
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(ttl) = lookup(ENV_TOAST_TTL_MS) {
            match ttl.trim().parse() {
                Ok(ms) => self.toast_ttl_ms = ms,
                Err(e) => warn!(value = %ttl, error = %e, "Ignoring invalid {}", ENV_TOAST_TTL_MS),
            }
        }

        if let Some(endpoint) = lookup(ENV_TELEMETRY_ENDPOINT).filter(|e| !e.is_empty()) {
            let telemetry = self.telemetry.get_or_insert_with(|| TelemetryConfig {
                endpoint: String::new(),
                token: None,
                timeout_secs: DEFAULT_TELEMETRY_TIMEOUT_SECS,
            });
            telemetry.endpoint = endpoint;
        }

        if let Some(token) = lookup(ENV_TELEMETRY_TOKEN) {
            match self.telemetry {
                Some(ref mut telemetry) => telemetry.token = Some(token),
                None => warn!("{} set without a telemetry endpoint", ENV_TELEMETRY_TOKEN),
            }
        }

        if let Some(dir) = lookup(ENV_STORAGE_DIR).filter(|d| !d.is_empty()) {
            self.storage_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn toast_ttl(&self) -> Duration {
        Duration::from_millis(self.toast_ttl_ms)
    }

    /// Directory holding the persistent token store
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}

// ============================================================================
// Tests
// ============================================================================
