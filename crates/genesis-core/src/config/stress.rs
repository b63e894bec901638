//! Stress harness configuration
//!
//! Controls the `queue-stress` tool: how the queue is sized, how many
//! threads hammer it, and how large the order key batches are.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// File name of the stress config inside the genesis config directory
pub const STRESS_CONFIG_FILE: &str = "stress.yaml";

/// Queue and order key stress parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// Queue capacity in items
    /// Small capacities exercise slot reuse and consumer parking.
    /// Default: 256
    pub capacity: i64,

    /// Number of producer threads
    /// Default: 4
    pub producers: usize,

    /// Number of consumer threads
    /// Default: 4
    pub consumers: usize,

    /// Items each producer enqueues
    /// Default: 100_000
    pub items_per_producer: usize,

    /// Keys generated per `OrderKey::multi` batch
    /// Default: 1000
    pub order_key_batch: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            producers: 4,
            consumers: 4,
            items_per_producer: 100_000,
            order_key_batch: 1000,
        }
    }
}

impl StressConfig {
    /// Reject configurations the harness cannot run
    pub fn validate(&self) -> Result<()> {
        if self.capacity < 1 || self.capacity > i32::MAX as i64 {
            bail!("capacity must be between 1 and {}, got {}", i32::MAX, self.capacity);
        }
        if self.producers == 0 {
            bail!("at least one producer thread is required");
        }
        if self.consumers == 0 {
            bail!("at least one consumer thread is required");
        }
        if self.items_per_producer == 0 {
            bail!("items_per_producer must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = StressConfig::default();
        assert_eq!(config.capacity, 256);
        assert_eq!(config.producers, 4);
        assert_eq!(config.consumers, 4);
        assert_eq!(config.items_per_producer, 100_000);
        assert_eq!(config.order_key_batch, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: StressConfig = serde_yaml::from_str("producers: 8\n").unwrap();
        assert_eq!(config.producers, 8);
        assert_eq!(config.capacity, 256);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            StressConfig { capacity: 0, ..Default::default() },
            StressConfig { capacity: -5, ..Default::default() },
            StressConfig { producers: 0, ..Default::default() },
            StressConfig { consumers: 0, ..Default::default() },
            StressConfig { items_per_producer: 0, ..Default::default() },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{:?} should be rejected", config);
        }
    }
}
