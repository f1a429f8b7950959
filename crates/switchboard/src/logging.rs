//! Logging system setup and configuration.
//!
//! Installs a `tracing-subscriber` registry filtered by `RUST_LOG` when set,
//! otherwise by the configured level, with human or JSON output.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Sets up the global logging subscriber.
///
/// # Arguments
///
/// * `config` - Logging settings from the configuration file
/// * `json_format` - Forces JSON output (CLI override)
///
/// # Returns
///
/// An error if a global subscriber is already installed.
pub fn setup_logging(
    config: &LoggingSettings,
    json_format: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Scheduler loops run on named threads, so thread names are kept in both formats.
    if json_format || config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

/// Logs the startup banner.
pub fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════╗");
    info!("║          🔀 SWITCHBOARD 🔀           ║");
    info!("║   signal/slot pipeline host v{:<7} ║", version);
    info!("╚══════════════════════════════════════╝");
}
