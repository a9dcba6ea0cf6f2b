//! Scheduler configuration.
//!
//! Settings load from a `config.toml` in the working directory, with
//! environment variables taking precedence. A `.env` file is honored when
//! present.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::errors::{Error, Result};

const ENV_GATEWAY_TIMEOUT: &str = "STANDING_ORDERS_GATEWAY_TIMEOUT_SECS";
const ENV_PREVIEW_OCCURRENCES: &str = "STANDING_ORDERS_PREVIEW_OCCURRENCES";

/// Tunable settings of the scheduling core.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound in seconds on one gateway submission call.
    pub gateway_timeout_secs: u64,
    /// How many upcoming occurrences a preview lists.
    pub preview_occurrences: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            gateway_timeout_secs: 30,
            preview_occurrences: 12,
        }
    }
}

impl SchedulerConfig {
    /// The gateway timeout as a [`Duration`].
    #[must_use]
    pub const fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    /// Loads configuration from a TOML file, then applies environment
    /// overrides.
    ///
    /// # Errors
    /// Returns `Config` when the file cannot be read or parsed, or when an
    /// override variable holds a non-numeric value.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
            message: format!("Failed to read config file: {e}"),
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| Error::Config {
            message: format!("Failed to parse config.toml: {e}"),
        })?;
        config.with_env_overrides()
    }

    /// Loads configuration from the default location (`./config.toml`),
    /// falling back to defaults when the file is absent. Environment
    /// overrides apply either way.
    ///
    /// # Errors
    /// Returns `Config` on a malformed file or override variable.
    pub fn load_default() -> Result<Self> {
        dotenvy::dotenv().ok();
        if Path::new("config.toml").exists() {
            Self::load("config.toml")
        } else {
            info!("no config.toml found, using defaults");
            Self::default().with_env_overrides()
        }
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var(ENV_GATEWAY_TIMEOUT) {
            self.gateway_timeout_secs = value.parse().map_err(|_| Error::Config {
                message: format!("{ENV_GATEWAY_TIMEOUT} must be an integer, got {value:?}"),
            })?;
        }
        if let Ok(value) = std::env::var(ENV_PREVIEW_OCCURRENCES) {
            self.preview_occurrences = value.parse().map_err(|_| Error::Config {
                message: format!("{ENV_PREVIEW_OCCURRENCES} must be an integer, got {value:?}"),
            })?;
        }
        Ok(self)
    }
}
