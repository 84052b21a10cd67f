//! Configuration management.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//!
//! Library users never need a file: every section has a `Default`, and the
//! detector and repair configs are derived from [`Settings`].
//!
//! # Example
//!
//! ```no_run
//! use chanmap_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new("chanmap.toml");
//! config.load_or_create().unwrap();
//!
//! config.settings_mut().detection.parallel = false;
//! config.update_section(ConfigSection::Detection).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, DetectionSettings, LoggingSettings, RepairSettings, Settings, ToolSettings,
};
