//! Configuration for node watchers.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
mod retry;
pub use retry::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::CONFIG_PATH_ENV;
use crate::constants::ENV_PREFIX;
use crate::constants::ENV_SEPARATOR;
use crate::Result;

/// Settings shared by every [`NodeWatcher`](crate::NodeWatcher)
///
/// Sources are merged with increasing priority:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables prefixed with `WATCHER__`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Arm the child-set subscription when the node exists at construction
    #[serde(default = "default_watch_children")]
    pub watch_children: bool,

    /// Retry policy for get-data calls made by the refresh handlers
    #[serde(default)]
    pub fetch_retry: BackoffPolicy,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            watch_children: default_watch_children(),
            fetch_retry: BackoffPolicy::default(),
        }
    }
}

impl WatcherConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// # Note
    /// Validation is deferred so that `with_override_config()` can still be
    /// applied. Callers must call `validate()` before use.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("WATCHER__FETCH_RETRY__MAX_RETRIES", "5");
    /// let cfg = WatcherConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from a file without validation.
    ///
    /// Environment variables still take precedence over the file.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Consumes self and returns it if every field is usable.
    pub fn validate(self) -> Result<Self> {
        self.fetch_retry.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .ignore_empty(true)
        .try_parsing(true)
}

fn default_watch_children() -> bool {
    true
}
