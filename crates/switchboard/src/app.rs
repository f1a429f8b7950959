//! Application lifecycle.
//!
//! `Application` builds the pipeline, starts one scheduler per stage (or one
//! shared scheduler), feeds the producer from a ticker worker and shuts down
//! once every item was produced or a termination signal arrives. Loops are
//! entered outermost first and exited in data-flow order, so each exit drains
//! into a loop that is still running.

use crate::cli::CliArgs;
use crate::config::{AppConfig, LoopLayout};
use crate::logging::display_banner;
use crate::pipeline::Pipeline;
use crate::signals::{wait_for_shutdown_signal, wait_for_shutdown_signal_silent};
use crate::ticker::Ticker;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchboard_core::{
    connect_slot, ExceptionPolicy, Scheduler, SchedulerStats, Slot, Value, Worker,
};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// What a run produced, consumed and how busy each loop was.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Items the ticker asked the producer for
    pub produced: u64,
    /// Items that reached the consumer, in arrival order
    pub consumed: Vec<String>,
    /// Per-loop call counters, in data-flow order
    pub loops: Vec<(String, SchedulerStats)>,
}

/// Main application struct.
pub struct Application {
    config: AppConfig,
}

impl Application {
    /// Loads configuration, applies CLI overrides and validates the result.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if let Some(items) = args.items {
            config.pipeline.item_count = items;
        }
        if let Some(backend) = args.backend {
            config.scheduler.backend = backend;
        }
        if args.stop_loop_on_error {
            config.scheduler.exception_policy = ExceptionPolicy::StopLoop;
        }

        let app = Self::from_config(config)?;
        info!("✅ Configuration loaded and validated successfully");
        display_banner();
        Ok(app)
    }

    /// Creates an application from an already merged configuration.
    pub fn from_config(config: AppConfig) -> Result<Self, String> {
        config
            .validate()
            .map_err(|e| format!("Configuration validation failed: {e}"))?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Runs the pipeline until done or until the process is asked to stop.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let shutdown = async {
            if let Err(e) = wait_for_shutdown_signal().await {
                error!("Failed to set up signal handlers: {e}");
                futures::future::pending::<()>().await;
            }

            tokio::spawn(async move {
                if let Err(e) = wait_for_shutdown_signal_silent().await {
                    error!("Failed to set up forced shutdown signal handler: {e}");
                    return;
                }
                warn!("Shutdown signal received again, exiting immediately");
                std::process::exit(1);
            });
        };

        let summary = self.run_until(shutdown).await?;
        info!(
            produced = summary.produced,
            consumed = summary.consumed.len(),
            "📊 Pipeline finished"
        );
        for (name, stats) in &summary.loops {
            info!(
                scheduler = %name,
                enqueued = stats.calls_enqueued,
                completed = stats.calls_completed,
                failed = stats.calls_failed,
                "📊 Loop statistics"
            );
        }
        Ok(())
    }

    /// Runs the pipeline until every item was produced or `shutdown`
    /// resolves, then drains and stops every loop.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<RunSummary, Box<dyn std::error::Error>>
    where
        F: Future<Output = ()>,
    {
        let pipeline = Arc::new(Pipeline::new()?);
        let handle = Handle::current();
        let schedulers = self.attach_schedulers(&pipeline, &handle)?;

        for scheduler in schedulers.iter().rev() {
            scheduler.enter()?;
        }
        info!(
            loops = schedulers.len(),
            items = self.config.pipeline.item_count,
            backend = ?self.config.scheduler.backend,
            "✅ Pipeline is running"
        );

        let produced = Arc::new(AtomicU64::new(0));
        let (done, finished) = oneshot::channel();
        let ticker = Worker::start(
            "ticker",
            &handle,
            self.config.scheduler.exception_policy,
            Ticker::new(
                pipeline.clone(),
                Duration::from_millis(self.config.pipeline.tick_interval_ms),
                self.config.pipeline.item_count,
                produced.clone(),
                done,
            ),
        );

        tokio::select! {
            produced_all = finished => match produced_all {
                Ok(()) => info!("All items produced"),
                Err(_) => warn!("Ticker stopped before producing every item"),
            },
            _ = shutdown => info!("🛑 Shutdown requested, draining loops"),
        }

        let report = ticker.stop().await;
        if report.failures > 0 {
            warn!(failures = report.failures, "Ticker reported failures");
        }

        for scheduler in &schedulers {
            scheduler.exit().await;
        }

        Ok(RunSummary {
            produced: produced.load(Ordering::SeqCst),
            consumed: pipeline.consumed(),
            loops: schedulers
                .iter()
                .map(|scheduler| (scheduler.name().to_string(), scheduler.stats()))
                .collect(),
        })
    }

    fn attach_schedulers(
        &self,
        pipeline: &Pipeline,
        handle: &Handle,
    ) -> Result<Vec<Scheduler>, Box<dyn std::error::Error>> {
        let settings = self.config.scheduler;
        let schedulers = match self.config.pipeline.loops {
            LoopLayout::Shared => {
                let shared =
                    Scheduler::from_config(settings.for_loop("pipeline"), Some(handle.clone()))?;
                pipeline.share_scheduler(&shared);
                vec![shared]
            }
            LoopLayout::PerStage => {
                let mut schedulers = Vec::with_capacity(4);
                for stage in pipeline.stages() {
                    let scheduler =
                        Scheduler::from_config(settings.for_loop(stage.name()), Some(handle.clone()))?;
                    stage.set_scheduler(Some(scheduler.clone()));
                    schedulers.push(scheduler);
                }
                schedulers
            }
        };

        for scheduler in &schedulers {
            let name = scheduler.name().to_string();
            connect_slot(
                scheduler,
                "stopped",
                &Slot::new("onStopped", move |_| {
                    info!(scheduler = %name, "Loop stopped");
                    Ok(Value::Null)
                }),
            )?;
        }
        Ok(schedulers)
    }
}
