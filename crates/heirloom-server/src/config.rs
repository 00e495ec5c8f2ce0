//! Server configuration — parsed from TOML file + environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// General server settings
    #[serde(default)]
    pub server: ServerSection,

    /// Scheduler tick settings
    #[serde(default)]
    pub scheduler: SchedulerSection,
}

/// General server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Data directory (event log dumps, state files)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Scheduler tick settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    /// Seconds between ticks (default: 10 minutes)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Will ids scanned per poll (bounded per-tick work)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/heirloom")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tick_interval() -> u64 {
    600
}

fn default_batch_size() -> usize {
    10
}

impl ServerConfig {
    /// Load from a TOML file. A missing file yields pure defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ServerConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Apply `HEIRLOOM_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("HEIRLOOM_DATA_DIR") {
            self.server.data_dir = PathBuf::from(dir);
        }
        if let Ok(level) = std::env::var("HEIRLOOM_LOG_LEVEL") {
            self.server.log_level = level;
        }
        if let Ok(interval) = std::env::var("HEIRLOOM_TICK_INTERVAL") {
            if let Ok(secs) = interval.parse() {
                self.scheduler.tick_interval_secs = secs;
            }
        }
        if let Ok(batch) = std::env::var("HEIRLOOM_BATCH_SIZE") {
            if let Ok(size) = batch.parse() {
                self.scheduler.batch_size = size;
            }
        }
    }

    /// Validate the assembled configuration.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.tick_interval_secs == 0 {
            anyhow::bail!("scheduler.tick_interval_secs must be positive");
        }
        if self.scheduler.batch_size == 0 {
            anyhow::bail!("scheduler.batch_size must be positive");
        }
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.server.log_level.as_str()) {
            anyhow::bail!(
                "unknown log level '{}' (expected one of {:?})",
                self.server.log_level,
                valid_levels
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.scheduler.tick_interval_secs, 600);
        assert_eq!(config.scheduler.batch_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[scheduler]
tick_interval_secs = 60
"#
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.scheduler.tick_interval_secs, 60);
        // Unspecified sections fall back to defaults
        assert_eq!(config.scheduler.batch_size, 10);
        assert_eq!(config.server.log_level, "info");
    }

    #[test]
    fn test_missing_file_is_defaults() {
        let config = ServerConfig::from_file(Path::new("/nonexistent/heirloom.toml")).unwrap();
        assert_eq!(config.scheduler.batch_size, 10);
    }

    #[test]
    fn test_validation_rejects_zero_batch() {
        let mut config = ServerConfig::default();
        config.scheduler.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.server.log_level = "loud".into();
        assert!(config.validate().is_err());
    }
}
