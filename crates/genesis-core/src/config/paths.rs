//! Standard locations for genesis configuration files

use std::path::PathBuf;

/// Directory holding genesis configuration
///
/// Returns: `{config_dir}/genesis` (`~/.config/genesis` on Linux), or
/// `./genesis` if the platform has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("genesis")
}

/// Path of a named config file inside [`default_config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_genesis() {
        assert!(default_config_dir().ends_with("genesis"));
    }

    #[test]
    fn test_config_path_includes_filename() {
        let path = default_config_path("stress.yaml");
        assert!(path.ends_with("genesis/stress.yaml"));
    }
}
