//! Configuration utilities for genesis tools
//!
//! - Generic YAML config loading/saving
//! - Default config locations
//! - Stress harness parameters
//!
//! # Usage
//!
//! ```ignore
//! use genesis_core::config::{default_config_path, load_config, StressConfig, STRESS_CONFIG_FILE};
//!
//! let config: StressConfig = load_config(&default_config_path(STRESS_CONFIG_FILE));
//! config.validate()?;
//! ```

mod io;
mod paths;
mod stress;

pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path};
pub use stress::{StressConfig, STRESS_CONFIG_FILE};
