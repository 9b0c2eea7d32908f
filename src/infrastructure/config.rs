//! Settings file
//!
//! An optional YAML file supplying defaults that command-line flags can
//! still override.

use crate::pipeline::{ConfigError, DEFAULT_PIP_DEPENDENCIES, DEFAULT_REPO_FILE_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Python packages installed before fetching sources
    pub pip_dependencies: Vec<String>,
    /// Manifest used when `--repo-file-url` is not given
    pub default_repo_file_url: String,
    /// Host interpreter used when `--python-interpreter` is not given
    pub python_interpreter: Option<PathBuf>,
    /// Log level used when `--log-level` is not given
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pip_dependencies: DEFAULT_PIP_DEPENDENCIES
                .iter()
                .map(ToString::to_string)
                .collect(),
            default_repo_file_url: DEFAULT_REPO_FILE_URL.to_string(),
            python_interpreter: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Reads the settings file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Settings`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings_error = |message: String| ConfigError::Settings {
            path: path.display().to_string(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| settings_error(e.to_string()))?;
        serde_yaml::from_str(&content).map_err(|e| settings_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.default_repo_file_url, DEFAULT_REPO_FILE_URL);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.pip_dependencies.len(), DEFAULT_PIP_DEPENDENCIES.len());
        assert!(config.python_interpreter.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ros2-batch.yaml");
        std::fs::write(&path, "pip_dependencies: [vcstool]\npython_interpreter: /usr/bin/python3.6\n")
            .unwrap();

        let config = Config::load(&path).unwrap();

        assert_eq!(config.pip_dependencies, vec!["vcstool".to_string()]);
        assert_eq!(config.python_interpreter, Some(PathBuf::from("/usr/bin/python3.6")));
        assert_eq!(config.default_repo_file_url, DEFAULT_REPO_FILE_URL);
    }

    #[test]
    fn test_invalid_file_is_a_settings_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "pip_dependencies: 3\n").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Settings { .. })));
        assert!(matches!(
            Config::load(&dir.path().join("missing.yaml")),
            Err(ConfigError::Settings { .. })
        ));
    }
}
