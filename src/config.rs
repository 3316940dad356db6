//! Engine configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then `WEFT_*`
//! environment variables (a `.env` file is honored via dotenvy). All fields
//! have working defaults so zero configuration is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bounded retry limit for worker/sub-job dispatch failures.
    #[serde(default = "default_max_dispatch_retries")]
    pub max_dispatch_retries: u32,

    /// How long `request()` waits for a terminal job result.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_dispatch_retries() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_dispatch_retries: default_max_dispatch_retries(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config_path: Option<PathBuf>,
}

impl EngineConfigBuilder {
    /// Path to an optional TOML config file.
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn build(self) -> Result<EngineConfig> {
        // Load .env if present; missing file is fine
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder()
            .set_default("max_dispatch_retries", default_max_dispatch_retries())?
            .set_default("request_timeout_secs", default_request_timeout_secs() as i64)?;

        if let Some(path) = &self.config_path {
            builder = builder.add_source(config::File::from(path.clone()).required(true));
        }

        builder = builder.add_source(config::Environment::with_prefix("WEFT"));

        let config = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize::<EngineConfig>()
            .context("Failed to deserialize configuration")?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_file_or_env() {
        let config = EngineConfig::builder().build().unwrap();
        assert_eq!(config.max_dispatch_retries, 3);
        assert_eq!(config.request_timeout_secs, 30);
    }
}
