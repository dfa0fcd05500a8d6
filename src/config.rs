//! TOML runtime configuration for the coordinator and workers.
//!
//! Both sections are optional; command-line flags fill in or override
//! whatever the file leaves out.
//!
//! # Example TOML
//!
//! ```toml
//! [coordinator]
//! bind = "0.0.0.0:8080"
//! workers = 3
//! job = "module_map.conf"
//!
//! [worker]
//! coordinator = "127.0.0.1:8080"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::coordinator::MAX_WORKERS;
use crate::error::ConfigError;

/// Default coordinator listen address.
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// Default coordinator address for workers.
pub const DEFAULT_COORDINATOR: &str = "127.0.0.1:8080";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Coordinator settings.
    #[serde(default)]
    pub coordinator: Option<CoordinatorConfig>,
    /// Worker settings.
    #[serde(default)]
    pub worker: Option<WorkerConfig>,
}

/// `[coordinator]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Listen address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Number of workers to wait for.
    pub workers: usize,
    /// Module map of the job to run.
    pub job: PathBuf,
}

/// `[worker]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Coordinator address.
    #[serde(default = "default_coordinator")]
    pub coordinator: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            coordinator: default_coordinator(),
        }
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_coordinator() -> String {
    DEFAULT_COORDINATOR.to_string()
}

impl Config {
    /// Parses and validates TOML text.
    ///
    /// # Examples
    ///
    /// ```
    /// use pla_compose::config::Config;
    ///
    /// let config = Config::from_toml("[coordinator]\nworkers = 2\njob = \"job.conf\"\n").unwrap();
    /// let coordinator = config.coordinator.unwrap();
    /// assert_eq!(coordinator.bind, "0.0.0.0:8080");
    /// assert_eq!(coordinator.workers, 2);
    ///
    /// assert!(Config::from_toml("[coordinator]\nworkers = 0\njob = \"j\"\n").is_err());
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a config file.
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Parse`] if the TOML is malformed, or
    /// [`ConfigError::Validation`] if a value is out of range.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        Self::from_toml(&content)
    }

    /// Checks every present section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(coordinator) = &self.coordinator {
            coordinator.validate()?;
        }
        if let Some(worker) = &self.worker {
            worker.validate()?;
        }
        Ok(())
    }
}

impl CoordinatorConfig {
    /// Checks the worker count and addresses.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_workers(self.workers)?;
        if self.bind.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "coordinator.bind must not be empty".to_string(),
            });
        }
        if self.job.as_os_str().is_empty() {
            return Err(ConfigError::Validation {
                message: "coordinator.job must name a module map".to_string(),
            });
        }
        Ok(())
    }
}

impl WorkerConfig {
    /// Checks the coordinator address.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coordinator.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "worker.coordinator must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Checks that `workers` lies in `1..=MAX_WORKERS`.
pub fn validate_workers(workers: usize) -> Result<(), ConfigError> {
    if !(1..=MAX_WORKERS).contains(&workers) {
        return Err(ConfigError::Validation {
            message: format!("workers must be between 1 and {MAX_WORKERS}, got {workers}"),
        });
    }
    Ok(())
}
