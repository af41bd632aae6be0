//! Service Configuration Module
//!
//! Provides configuration loading and management for the actor runtime.
//! Supports loading from TOML files with environment-specific overrides.

use crate::service::{bridge, logging, runtime};
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Main service configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Global settings
    pub global: GlobalConfig,

    /// Actor runtime settings
    pub runtime: RuntimeSettings,

    /// Completion bridge settings
    pub bridge: BridgeSettings,
}

/// Global configuration settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GlobalConfig {
    pub system_name: String,
    pub log_level: String,
}

/// Actor runtime settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Capacity of each actor's control lane
    pub control_capacity: usize,

    /// Grace period granted to a worker asked to stop
    pub stop_grace_ms: u64,
}

/// Completion bridge settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct BridgeSettings {
    pub deferred_timeout_ms: u64,
    pub worker_component: String,
    pub payload: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            system_name: runtime::SYSTEM_NAME.to_string(),
            log_level: logging::LOG_LEVEL.to_string(),
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            control_capacity: runtime::CONTROL_CAPACITY,
            stop_grace_ms: runtime::STOP_GRACE_MS,
        }
    }
}

impl RuntimeSettings {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            deferred_timeout_ms: bridge::DEFERRED_TIMEOUT_MS,
            worker_component: bridge::WORKER_COMPONENT.to_string(),
            payload: bridge::PAYLOAD.to_string(),
        }
    }
}

impl BridgeSettings {
    pub fn deferred_timeout(&self) -> Duration {
        Duration::from_millis(self.deferred_timeout_ms)
    }
}

impl ServiceConfig {
    /// Load configuration from files with environment overrides
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let base = base_path.unwrap_or(Path::new("config/service.toml"));

        let mut builder = Config::builder().add_source(File::from(base).required(true));

        // Add environment-specific overrides if specified
        if let Some(env) = environment {
            let env_file = PathBuf::from("config/environments").join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        // Override with environment variables (DEFERRED__SECTION__KEY)
        builder = builder.add_source(
            Environment::with_prefix("DEFERRED")
                .separator("__")
                .try_parsing(true),
        );

        let config: ServiceConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        debug!(
            system_name = %config.global.system_name,
            deferred_timeout_ms = config.bridge.deferred_timeout_ms,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Reject settings the runtime cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.global.system_name.trim().is_empty() {
            bail!("global.system_name must not be empty");
        }
        if self.runtime.control_capacity == 0 {
            bail!("runtime.control_capacity must be greater than zero");
        }
        if self.bridge.deferred_timeout_ms == 0 {
            bail!("bridge.deferred_timeout_ms must be greater than zero");
        }
        if self.bridge.worker_component.trim().is_empty() {
            bail!("bridge.worker_component must not be empty");
        }
        Ok(())
    }
}

/// Convenience function to load configuration with defaults.
///
/// Falls back to built-in defaults when `config/service.toml` is absent.
pub fn load_config(environment: Option<&str>) -> Result<ServiceConfig> {
    let base = Path::new("config/service.toml");
    if !base.exists() {
        warn!("No configuration file at {:?}, using defaults", base);
        let config = ServiceConfig::default();
        config.validate()?;
        return Ok(config);
    }
    ServiceConfig::load(Some(base), environment)
}
