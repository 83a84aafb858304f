//! # Configuration Module
//!
//! Service settings, layered in this order (later wins):
//!
//! 1. Built-in defaults
//! 2. An optional TOML file (`--config portflow.toml`)
//! 3. `PORTFLOW_*` environment variables
//! 4. CLI flags (applied by the command layer)
//!
//! ## Environment Variables
//!
//! - `PORTFLOW_HOST`, `PORTFLOW_PORT`: bind address
//! - `PORTFLOW_MAX_COMBINATIONS`: resolution ceiling per component
//! - `PORTFLOW_RATE_LIMIT`: requests per second (0 disables limiting)
//! - `PORTFLOW_CORS_ORIGINS`: comma-separated origins, or "*"
//!
//! The API key is never read from the file. See `api::auth`.

use portflow_core::PortflowError;
use portflow_core::primitives::DEFAULT_MAX_COMBINATIONS;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Largest configuration file accepted (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortflowConfig {
    pub host: String,
    pub port: u16,
    pub max_combinations: usize,
    pub rate_limit: u32,
    /// `None` keeps the localhost-only CORS default.
    pub cors_origins: Option<Vec<String>>,
}

impl Default for PortflowConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_combinations: DEFAULT_MAX_COMBINATIONS,
            rate_limit: DEFAULT_RATE_LIMIT,
            cors_origins: None,
        }
    }
}

impl PortflowConfig {
    /// Defaults, then the file (if any), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, PortflowError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, PortflowError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            PortflowError::Io(format!("cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(PortflowError::Io(format!(
                "config '{}' is {} bytes, maximum is {}",
                path.display(),
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            PortflowError::Io(format!("cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, PortflowError> {
        toml::from_str(text)
            .map_err(|e| PortflowError::InvalidRequest(format!("invalid config: {}", e)))
    }

    /// Override fields from `PORTFLOW_*` variables found through `lookup`.
    ///
    /// Unset or empty variables leave the field alone; unparsable ones fail.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), PortflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("PORTFLOW_HOST") {
            self.host = host.trim().to_string();
        }
        if let Some(port) = get("PORTFLOW_PORT") {
            self.port = parse_var("PORTFLOW_PORT", &port)?;
        }
        if let Some(limit) = get("PORTFLOW_MAX_COMBINATIONS") {
            self.max_combinations = parse_var("PORTFLOW_MAX_COMBINATIONS", &limit)?;
        }
        if let Some(rps) = get("PORTFLOW_RATE_LIMIT") {
            self.rate_limit = parse_var("PORTFLOW_RATE_LIMIT", &rps)?;
        }
        if let Some(origins) = get("PORTFLOW_CORS_ORIGINS") {
            self.cors_origins = Some(
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect(),
            );
        }
        Ok(())
    }

    /// `host:port` for binding.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, PortflowError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| PortflowError::InvalidRequest(format!("{key}={raw}: {e}")))
}

// =============================================================================
// TESTS
// =============================================================================
