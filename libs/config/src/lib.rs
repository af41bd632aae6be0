//! # Deferred Actors Configuration
//!
//! Centralized configuration and defaults for the deferred actor runtime,
//! the completion bridge and the demo service.
//!
//! ## Features
//!
//! - **Defaults**: Timeouts, mailbox sizing and component names
//! - **Service Configuration**: TOML files with environment overlays and
//!   `DEFERRED__*` environment variable overrides
//!
//! ## Usage
//!
//! ```rust,no_run
//! use deferred_config::{defaults, load_config};
//!
//! let config = load_config(None).unwrap();
//! assert!(config.bridge.deferred_timeout_ms > 0);
//! assert_eq!(defaults::bridge::DEFERRED_TIMEOUT_MS, 1_000);
//! ```

pub mod service;
pub mod service_config;

pub use service as defaults;
pub use service_config::{
    load_config, BridgeSettings, GlobalConfig, RuntimeSettings, ServiceConfig,
};
