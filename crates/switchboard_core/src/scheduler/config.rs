//! Scheduler configuration

use serde::{Deserialize, Serialize};

/// What a scheduler does after a slot it runs returns an error or panics.
///
/// The error is always logged and reported through the `exception` signal
/// and the failing call's handle resolves to the error; the policy only
/// decides what happens next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionPolicy {
    /// Stop the loop and terminate the process
    #[default]
    Terminate,
    /// Stop this loop only; other schedulers keep running
    StopLoop,
    /// Keep running the loop
    Continue,
}

/// Where a scheduler's loop executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// A dedicated OS thread driving its own single-threaded runtime
    #[default]
    Thread,
    /// A task spawned on a runtime handle supplied by the caller
    Task,
}

/// Configuration for a single scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Name used for the worker thread and in logs
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub exception_policy: ExceptionPolicy,
    #[serde(default)]
    pub backend: Backend,
}

fn default_name() -> String {
    "scheduler".to_string()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            exception_policy: ExceptionPolicy::default(),
            backend: Backend::default(),
        }
    }
}

impl SchedulerConfig {
    /// Default configuration under the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: ExceptionPolicy) -> Self {
        self.exception_policy = policy;
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fail_fast_on_a_thread() {
        let config = SchedulerConfig::default();
        assert_eq!(config.exception_policy, ExceptionPolicy::Terminate);
        assert_eq!(config.backend, Backend::Thread);
    }

    #[test]
    fn test_deserialize_snake_case() {
        let config: SchedulerConfig = serde_json::from_str(
            r#"{"name": "consumer", "exception_policy": "stop_loop", "backend": "task"}"#,
        )
        .unwrap();
        assert_eq!(
            config,
            SchedulerConfig::named("consumer")
                .with_policy(ExceptionPolicy::StopLoop)
                .with_backend(Backend::Task)
        );

        let partial: SchedulerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(partial, SchedulerConfig::default());
    }
}
