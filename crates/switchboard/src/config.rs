//! Configuration management for the switchboard host.
//!
//! Settings are loaded from a TOML file; a missing file is created with the
//! defaults so the next run has something to edit.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use switchboard_core::{Backend, ExceptionPolicy, SchedulerConfig};
use tracing::info;

fn default_item_count() -> u64 {
    10
}

fn default_tick_interval() -> u64 {
    100
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Settings shared by every scheduler the host creates
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    /// Demonstration pipeline settings
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Scheduler defaults applied to every loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default)]
    pub exception_policy: ExceptionPolicy,
    #[serde(default)]
    pub backend: Backend,
}

impl SchedulerSettings {
    /// Full scheduler configuration for a loop called `name`.
    pub fn for_loop(&self, name: &str) -> SchedulerConfig {
        SchedulerConfig::named(name)
            .with_policy(self.exception_policy)
            .with_backend(self.backend)
    }
}

/// How pipeline stages share event loops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopLayout {
    /// Every stage runs on one shared loop
    Shared,
    /// Each stage owns its loop
    #[default]
    PerStage,
}

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Items the producer emits before the host shuts down
    #[serde(default = "default_item_count")]
    pub item_count: u64,
    /// Delay between two produced items in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub loops: LoopLayout,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            item_count: default_item_count(),
            tick_interval_ms: default_tick_interval(),
            loops: LoopLayout::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration to `path`
    /// and returns it.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = AppConfig::default();
            tokio::fs::write(path, toml::to_string_pretty(&config)?).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(config)
        }
    }

    /// Checks the configuration for values the host cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        if self.pipeline.item_count == 0 {
            return Err("pipeline.item_count must be greater than 0".to_string());
        }

        if self.pipeline.tick_interval_ms == 0 {
            return Err("pipeline.tick_interval_ms must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert_eq!(config.scheduler.exception_policy, ExceptionPolicy::Terminate);
        assert_eq!(config.scheduler.backend, Backend::Thread);
        assert_eq!(config.pipeline.item_count, 10);
        assert_eq!(config.pipeline.tick_interval_ms, 100);
        assert_eq!(config.pipeline.loops, LoopLayout::PerStage);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        config.pipeline.item_count = 0;
        assert!(config.validate().is_err());

        config.pipeline.item_count = 3;
        config.pipeline.tick_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scheduler_settings_for_loop() {
        let settings = SchedulerSettings {
            exception_policy: ExceptionPolicy::StopLoop,
            backend: Backend::Task,
        };
        let config = settings.for_loop("even");
        assert_eq!(config.name, "even");
        assert_eq!(config.exception_policy, ExceptionPolicy::StopLoop);
        assert_eq!(config.backend, Backend::Task);
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file_writes_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("switchboard.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.pipeline.item_count, 10);
        assert!(path.exists());

        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.pipeline.loops, config.pipeline.loops);
    }

    #[tokio::test]
    async fn test_load_partial_file() {
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(
            file.path(),
            r#"
[scheduler]
exception_policy = "continue"
backend = "task"

[pipeline]
item_count = 4
loops = "shared"
"#,
        )
        .await
        .unwrap();

        let config = AppConfig::load_from_file(&file.path().to_path_buf()).await.unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.scheduler.exception_policy, ExceptionPolicy::Continue);
        assert_eq!(config.scheduler.backend, Backend::Task);
        assert_eq!(config.pipeline.item_count, 4);
        assert_eq!(config.pipeline.tick_interval_ms, 100);
        assert_eq!(config.pipeline.loops, LoopLayout::Shared);
    }

    #[tokio::test]
    async fn test_load_invalid_toml() {
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), "[pipeline\nitem_count = ").await.unwrap();
        assert!(AppConfig::load_from_file(&file.path().to_path_buf()).await.is_err());
    }
}
