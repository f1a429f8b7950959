//! # Switchboard - Demonstration Host
//!
//! Runs a producer → processors → consumer pipeline on top of
//! `switchboard_core`, with each stage owning its event loop. This entry
//! point handles CLI parsing, configuration loading and the application
//! lifecycle.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! switchboard
//!
//! # Produce 50 items on tokio-task loops
//! switchboard --items 50 --backend task
//!
//! # JSON logging
//! switchboard --json-logs --log-level debug
//! ```
//!
//! ## Configuration
//!
//! Settings come from a TOML file (default: `switchboard.toml`). If the file
//! doesn't exist, a default configuration is written there.
//!
//! ## Signal Handling
//!
//! SIGINT and SIGTERM stop production and drain every loop; a second signal
//! exits immediately.

use tracing::error;

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod signals;
pub mod ticker;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Main entry point for the switchboard host.
///
/// # Exit Codes
///
/// * **0**: The pipeline finished or was shut down cleanly
/// * **1**: Error during startup, configuration or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Logging comes up before the application so config loading is visible.
    let mut logging_settings = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default()
        .logging;
    if let Some(level) = &args.log_level {
        logging_settings.level = level.clone();
    }
    if let Err(e) = logging::setup_logging(&logging_settings, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

pub use app::RunSummary;
pub use config::{LoggingSettings, LoopLayout, PipelineSettings, SchedulerSettings};

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::{Backend, ExceptionPolicy};

    fn app(items: u64, loops: LoopLayout, backend: Backend) -> Application {
        let mut config = AppConfig::default();
        config.pipeline.item_count = items;
        config.pipeline.tick_interval_ms = 1;
        config.pipeline.loops = loops;
        config.scheduler.backend = backend;
        config.scheduler.exception_policy = ExceptionPolicy::StopLoop;
        Application::from_config(config).unwrap()
    }

    fn expected(count: u64) -> Vec<String> {
        (0..count)
            .map(|n| {
                let parity = if n % 2 == 0 { "even" } else { "odd" };
                format!("product {parity} {n}")
            })
            .collect()
    }

    #[tokio::test]
    async fn test_per_stage_thread_loops() {
        let summary = app(8, LoopLayout::PerStage, Backend::Thread)
            .run_until(futures::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.produced, 8);
        let mut consumed = summary.consumed.clone();
        consumed.sort();
        let mut wanted = expected(8);
        wanted.sort();
        assert_eq!(consumed, wanted);

        let names: Vec<&str> = summary.loops.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["producer", "even", "odd", "consumer"]);
        let producer = summary.loops[0].1;
        assert_eq!(producer.calls_completed, 8);
        assert_eq!(producer.calls_failed, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shared_task_loop() {
        let summary = app(6, LoopLayout::Shared, Backend::Task)
            .run_until(futures::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.produced, 6);
        assert_eq!(summary.consumed.len(), 6);
        assert_eq!(summary.loops.len(), 1);
        assert_eq!(summary.loops[0].0, "pipeline");
    }

    #[tokio::test]
    async fn test_shutdown_drains_what_was_produced() {
        let app = app(1_000, LoopLayout::PerStage, Backend::Thread);
        let summary = app
            .run_until(tokio::time::sleep(std::time::Duration::from_millis(20)))
            .await
            .unwrap();

        assert!(summary.produced < 1_000);
        assert_eq!(summary.consumed.len() as u64, summary.produced);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = AppConfig::default();
        config.pipeline.item_count = 0;
        assert!(Application::from_config(config).is_err());
    }
}
