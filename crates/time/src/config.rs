//! Configuration for peer time adjustment.

use std::path::Path;

use config::{Config, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Default ceiling on how far peers may move our clock: 70 minutes.
pub const DEFAULT_MAX_TIME_ADJUSTMENT: i64 = 70 * 60;

/// Environment prefix, e.g. `PEERCLOCK_MAX_TIME_ADJUSTMENT=600`.
pub const ENV_PREFIX: &str = "PEERCLOCK";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Largest absolute median offset (seconds) that is accepted.
    /// Negative values disable peer adjustment entirely.
    pub max_time_adjustment: i64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            max_time_adjustment: DEFAULT_MAX_TIME_ADJUSTMENT,
        }
    }
}

impl TimeConfig {
    pub fn with_max_time_adjustment(max_time_adjustment: i64) -> Self {
        Self {
            max_time_adjustment,
        }
    }

    /// Load from an optional TOML file, then `PEERCLOCK_*` environment
    /// variables. Missing keys fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(ConfigFile::from(path));
        }

        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Accepted offset bound, never negative.
    pub fn threshold(&self) -> i64 {
        self.max_time_adjustment.max(0)
    }
}
