//! YAML configuration loading and saving
//!
//! Works with any serde configuration type. Loading is forgiving: a missing
//! or broken file falls back to the type's defaults so a tool can always
//! start, while saving reports every failure.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load a configuration from a YAML file
///
/// Returns `T::default()` if the file does not exist, and logs a warning and
/// returns `T::default()` if it cannot be read or parsed.
///
/// # Example
///
/// ```ignore
/// let config: StressConfig = load_config(&default_config_path(STRESS_CONFIG_FILE));
/// ```
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("load_config: {:?} not found, using defaults", path);
        return T::default();
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            log::warn!("load_config: Failed to read {:?}: {}, using defaults", path, e);
            return T::default();
        }
    };

    match serde_yaml::from_str::<T>(&contents) {
        Ok(config) => {
            log::info!("load_config: Loaded {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("load_config: Failed to parse {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Save a configuration as YAML, creating parent directories as needed
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("save_config: Saved {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StressConfig;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config: StressConfig = load_config(Path::new("/nonexistent/genesis/stress.yaml"));
        assert_eq!(config, StressConfig::default());
    }

    #[test]
    fn test_unparsable_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stress.yaml");
        std::fs::write(&path, "capacity: [not, a, number]\n").unwrap();

        let config: StressConfig = load_config(&path);
        assert_eq!(config, StressConfig::default());
    }

    #[test]
    fn test_save_creates_directories_and_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stress.yaml");
        let config = StressConfig {
            capacity: 32,
            producers: 2,
            ..Default::default()
        };

        save_config(&config, &path).unwrap();
        let loaded: StressConfig = load_config(&path);
        assert_eq!(loaded, config);
    }
}
