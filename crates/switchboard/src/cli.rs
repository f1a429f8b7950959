//! Command-line interface for the switchboard host.
//!
//! Every option overrides the matching setting from the configuration file.

use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;
use switchboard_core::Backend;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the number of items to produce
    pub items: Option<u64>,
    /// Optional override for the scheduler backend
    pub backend: Option<Backend>,
    /// Stop only the failing loop instead of the whole process
    pub stop_loop_on_error: bool,
}

impl CliArgs {
    /// Parses the process arguments.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list; the first item is the binary name.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &clap::ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("switchboard.toml")),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            items: matches.get_one::<u64>("items").copied(),
            backend: matches
                .get_one::<String>("backend")
                .map(|backend| match backend.as_str() {
                    "task" => Backend::Task,
                    _ => Backend::Thread,
                }),
            stop_loop_on_error: matches.get_flag("stop-loop-on-error"),
        }
    }
}

fn command() -> Command {
    Command::new("Switchboard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Runs a producer → processors → consumer pipeline over per-owner event loops")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("switchboard.toml"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("items")
                .short('n')
                .long("items")
                .value_name("COUNT")
                .help("Number of items the producer emits")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("backend")
                .short('b')
                .long("backend")
                .value_name("BACKEND")
                .help("Where scheduler loops run")
                .value_parser(["thread", "task"]),
        )
        .arg(
            Arg::new("stop-loop-on-error")
                .long("stop-loop-on-error")
                .help("Stop only the failing loop when a slot fails, instead of exiting")
                .action(ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["switchboard"]).unwrap();
        assert_eq!(args.config_path, PathBuf::from("switchboard.toml"));
        assert_eq!(args.log_level, None);
        assert!(!args.json_logs);
        assert_eq!(args.items, None);
        assert_eq!(args.backend, None);
        assert!(!args.stop_loop_on_error);
    }

    #[test]
    fn test_overrides() {
        let args = CliArgs::try_parse_from([
            "switchboard",
            "--config",
            "custom.toml",
            "-l",
            "debug",
            "--json-logs",
            "--items",
            "25",
            "--backend",
            "task",
            "--stop-loop-on-error",
        ])
        .unwrap();
        assert_eq!(args.config_path, PathBuf::from("custom.toml"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert_eq!(args.items, Some(25));
        assert_eq!(args.backend, Some(Backend::Task));
        assert!(args.stop_loop_on_error);
    }

    #[test]
    fn test_rejects_unknown_backend() {
        assert!(CliArgs::try_parse_from(["switchboard", "--backend", "fiber"]).is_err());
        assert!(CliArgs::try_parse_from(["switchboard", "--items", "many"]).is_err());
    }
}
