//! # Background Workers
//!
//! A [`Worker`] repeatedly awaits one step of a [`Work`] implementation on a
//! runtime handle until it is stopped. Transport adapters use it for their
//! receive loops and the host uses it for its ticker.
//!
//! Stopping is cooperative: the flag is checked between steps and a step in
//! progress always runs to completion.

use crate::error::{CallError, SlotError};
use crate::scheduler::{terminate_process, ExceptionPolicy, Terminator};
use crate::utils::panic_message;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// One unit of repeated background work.
#[async_trait]
pub trait Work: Send + 'static {
    async fn step(&mut self) -> Result<(), SlotError>;
}

#[async_trait]
impl<F> Work for F
where
    F: FnMut() -> BoxFuture<'static, Result<(), SlotError>> + Send + 'static,
{
    async fn step(&mut self) -> Result<(), SlotError> {
        (self)().await
    }
}

/// How a worker ended
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    /// Steps that completed successfully
    pub steps: u64,
    /// Steps that failed or panicked
    pub failures: u64,
    /// The error that stopped the worker, if one did
    pub stopped_by: Option<String>,
}

/// Handle to a running background worker.
pub struct Worker {
    name: String,
    stop: Arc<AtomicBool>,
    task: Option<JoinHandle<WorkerReport>>,
}

impl Worker {
    /// Spawns `work` on `handle`.
    ///
    /// # Arguments
    ///
    /// * `name` - Name used in logs
    /// * `handle` - Runtime the worker task runs on
    /// * `policy` - What a failing step does to the worker
    /// * `work` - The step to repeat
    pub fn start<W: Work>(name: impl Into<String>, handle: &Handle, policy: ExceptionPolicy, work: W) -> Self {
        Self::start_with_terminator(name, handle, policy, work, terminate_process())
    }

    pub(crate) fn start_with_terminator<W: Work>(
        name: impl Into<String>,
        handle: &Handle,
        policy: ExceptionPolicy,
        mut work: W,
        terminator: Terminator,
    ) -> Self {
        let name = name.into();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let label = name.clone();

        let task = handle.spawn(async move {
            let mut report = WorkerReport::default();
            debug!(worker = %label, "Worker started");
            while !flag.load(Ordering::Acquire) {
                let outcome = match AssertUnwindSafe(work.step()).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(payload) => Err(SlotError::Panicked(panic_message(payload.as_ref()))),
                };

                match outcome {
                    Ok(()) => report.steps += 1,
                    Err(err) => {
                        report.failures += 1;
                        error!(worker = %label, error = %err, "Worker step failed");
                        match policy {
                            ExceptionPolicy::Continue => {}
                            ExceptionPolicy::StopLoop => {
                                report.stopped_by = Some(err.to_string());
                                break;
                            }
                            ExceptionPolicy::Terminate => {
                                terminator(&CallError::from(err.clone()));
                                report.stopped_by = Some(err.to_string());
                                break;
                            }
                        }
                    }
                }
                tokio::task::yield_now().await;
            }
            debug!(worker = %label, steps = report.steps, "Worker finished");
            report
        });

        Self {
            name,
            stop,
            task: Some(task),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the worker has left its loop.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Requests a stop and waits for the current step to finish.
    pub async fn stop(mut self) -> WorkerReport {
        self.stop.store(true, Ordering::Release);
        self.join().await
    }

    /// Waits for the worker to end on its own.
    pub async fn join(&mut self) -> WorkerReport {
        match self.task.take() {
            Some(task) => task.await.unwrap_or_else(|err| {
                error!(worker = %self.name, error = %err, "Worker task aborted");
                WorkerReport {
                    stopped_by: Some(err.to_string()),
                    ..WorkerReport::default()
                }
            }),
            None => WorkerReport::default(),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::Mutex;
    use std::time::Duration;

    fn counting(counter: &Arc<AtomicU64>) -> impl Work {
        let counter = counter.clone();
        move || -> BoxFuture<'static, Result<(), SlotError>> {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                Ok(())
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_runs_until_stopped() {
        let counter = Arc::new(AtomicU64::new(0));
        let worker = Worker::start("ticker", &Handle::current(), ExceptionPolicy::StopLoop, counting(&counter));

        while counter.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let report = worker.stop().await;
        assert!(report.steps >= 3);
        assert_eq!(report.failures, 0);
        assert_eq!(report.stopped_by, None);
    }

    struct FailAt {
        step: u64,
        fail_at: u64,
    }

    #[async_trait]
    impl Work for FailAt {
        async fn step(&mut self) -> Result<(), SlotError> {
            self.step += 1;
            if self.step == self.fail_at {
                return Err(SlotError::failed("step failed"));
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stop_loop_policy_ends_worker_on_failure() {
        let mut worker = Worker::start(
            "fragile",
            &Handle::current(),
            ExceptionPolicy::StopLoop,
            FailAt { step: 0, fail_at: 3 },
        );
        let report = worker.join().await;
        assert_eq!(report.steps, 2);
        assert_eq!(report.failures, 1);
        assert_eq!(report.stopped_by.as_deref(), Some("Slot failed: step failed"));
        assert!(worker.is_finished());
    }

    #[tokio::test]
    async fn test_continue_policy_survives_failures() {
        let worker = Worker::start(
            "tolerant",
            &Handle::current(),
            ExceptionPolicy::Continue,
            FailAt { step: 0, fail_at: 1 },
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        let report = worker.stop().await;
        assert_eq!(report.failures, 1);
        assert!(report.steps >= 1);
    }

    #[tokio::test]
    async fn test_terminate_policy_calls_terminator() {
        let terminated = Arc::new(Mutex::new(Vec::new()));
        let sink = terminated.clone();
        let mut worker = Worker::start_with_terminator(
            "critical",
            &Handle::current(),
            ExceptionPolicy::Terminate,
            FailAt { step: 0, fail_at: 1 },
            Arc::new(move |err: &CallError| sink.lock().unwrap().push(err.to_string())),
        );
        let report = worker.join().await;
        assert_eq!(report.failures, 1);
        assert_eq!(*terminated.lock().unwrap(), vec!["Slot failed: step failed"]);
    }
}
