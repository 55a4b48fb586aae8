//! Application configuration loaded from TOML
//!
//! A missing configuration file is created with defaults on first start so
//! operators have something concrete to edit.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory names at the data root that can never be used as server ids.
const RESERVED_NAMES: &[&str] = &["global_saves", "scenarios"];

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub data: DataSettings,
    /// Ids of the managed servers. Each id doubles as that server's
    /// directory name under the data root.
    pub servers: Vec<String>,
    pub process: ProcessSettings,
    pub logging: LoggingSettings,
    pub timing: TimingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    /// Root of the managed file tree.
    pub root_dir: PathBuf,
    /// Where downloaded server archives are cached.
    pub version_cache_dir: PathBuf,
    /// Script invoked with a branch name to deploy scenarios.
    pub scenario_deploy_script: PathBuf,
    /// Branch deployed when a scenario refresh is requested.
    pub scenario_branch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSettings {
    /// Executable invoked to control server processes, called as
    /// `<command> <action> <server-id> [args...]`.
    pub wrapper_command: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub json_format: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    /// Seconds between temp-save sweeps.
    pub temp_save_sweep_seconds: u64,
    /// Seconds before a lifecycle action is abandoned.
    pub action_timeout_seconds: u64,
    /// Seconds before a scenario deploy is abandoned.
    pub scenario_refresh_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: DataSettings {
                root_dir: PathBuf::from("data"),
                version_cache_dir: PathBuf::from("data/versions"),
                scenario_deploy_script: PathBuf::from("scripts/deploy_scenarios.sh"),
                scenario_branch: "main".to_string(),
            },
            servers: vec!["1".to_string()],
            process: ProcessSettings {
                wrapper_command: PathBuf::from("scripts/wrapper.sh"),
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
            timing: TimingSettings {
                temp_save_sweep_seconds: 60,
                action_timeout_seconds: 300,
                scenario_refresh_timeout_seconds: 300,
            },
        }
    }
}

impl AppConfig {
    /// Loads the configuration, writing a default file when none exists.
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading config {}", path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("parsing config {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("writing default config {}", path.display()))?;
            info!("created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            bail!("at least one server id must be configured");
        }

        let mut seen = std::collections::HashSet::new();
        for id in &self.servers {
            if id.trim().is_empty() {
                bail!("server ids must not be empty");
            }
            if id.contains('/') || id.contains('\\') {
                bail!("server id {id:?} must not contain path separators");
            }
            // Ids double as directory names; dot components would resolve
            // outside the data root.
            if id == "." || id == ".." {
                bail!("server id {id:?} is not a valid directory name");
            }
            if RESERVED_NAMES.contains(&id.as_str()) {
                bail!("server id {id:?} collides with a reserved directory name");
            }
            if !seen.insert(id) {
                bail!("duplicate server id {id:?}");
            }
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            bail!(
                "invalid log level {:?}, must be one of {:?}",
                self.logging.level,
                VALID_LOG_LEVELS
            );
        }

        if self.timing.temp_save_sweep_seconds == 0 {
            bail!("temp_save_sweep_seconds must be at least 1");
        }
        if self.timing.action_timeout_seconds == 0 {
            bail!("action_timeout_seconds must be at least 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn reserved_and_duplicate_server_ids_are_rejected() {
        let mut config = AppConfig::default();
        config.servers = vec!["global_saves".to_string()];
        assert!(config.validate().is_err());

        config.servers = vec!["1".to_string(), "1".to_string()];
        assert!(config.validate().is_err());

        config.servers = vec!["1".to_string(), "two".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn server_ids_with_separators_are_rejected() {
        let mut config = AppConfig::default();
        config.servers = vec!["a/b".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn dot_server_ids_are_rejected() {
        let mut config = AppConfig::default();
        for id in [".", ".."] {
            config.servers = vec![id.to_string()];
            assert!(config.validate().is_err(), "{id:?} must be rejected");
        }
    }

    #[test]
    fn bad_log_level_is_rejected() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garrison.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(config.servers, vec!["1".to_string()]);

        // A second load reads the file that was just written.
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.logging.level, config.logging.level);
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garrison.toml");
        tokio::fs::write(&path, "servers = 3").await.unwrap();

        assert!(AppConfig::load_from_file(&path).await.is_err());
    }
}
