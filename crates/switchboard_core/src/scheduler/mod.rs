//! # Scheduler
//!
//! A [`Scheduler`] is a per-owner event loop: a FIFO queue of deferred calls
//! drained by exactly one execution context, so no two calls queued on the
//! same scheduler ever run at the same time.
//!
//! ## Execution contexts
//!
//! - [`Backend::Thread`]: a dedicated OS thread that builds its own
//!   single-threaded tokio runtime and drives the loop on it.
//! - [`Backend::Task`]: a task spawned on a runtime [`Handle`] passed in by
//!   the caller. The scheduler never looks up an ambient runtime.
//!
//! ## Lifecycle
//!
//! `NotStarted → Running → Closing → Stopped`. [`Scheduler::enter`] starts the
//! loop, which emits `started` and then `idle`. Every queued call emits
//! `active` before it runs and `idle` after. [`Scheduler::exit`] stops intake
//! from other contexts once the queue has drained, waits for the loop to
//! finish and returns; `stopped` is emitted last.
//!
//! Calls may be queued before the scheduler starts; they run once it does.
//! After the scheduler has stopped, only its own context may still queue work
//! (for example from a `stopped` listener); everyone else gets
//! [`SchedulerError::Stopped`].
//!
//! ## Failures
//!
//! A failing or panicking call is logged, reported through the `exception`
//! signal with `[message, slot_name]`, and its handle resolves to the error.
//! [`ExceptionPolicy`] then decides whether the loop continues, stops, or
//! terminates the process.

mod config;

pub use config::{Backend, ExceptionPolicy, SchedulerConfig};

use crate::args;
use crate::args::Args;
use crate::deferred::{Deferred, DeferredCall};
use crate::error::{CallError, SchedulerError};
use crate::events::{Event, Events};
use crate::slot::{Callable, Slot};
use crate::traits::{Emitter, SignalRef};
use crate::utils::{lock, read, write};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

tokio::task_local! {
    static CURRENT: SchedulerId;
}

/// Names of the lifecycle signals every scheduler declares.
pub const LIFECYCLE_EVENTS: [&str; 5] = ["started", "idle", "active", "exception", "stopped"];

/// Unique identifier of a scheduler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchedulerId(Uuid);

impl std::fmt::Display for SchedulerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    NotStarted,
    Running,
    /// Draining; other contexts may still enqueue until the queue is empty
    Closing,
    Stopped,
}

/// Call counters of a scheduler
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Calls accepted into the queue
    pub calls_enqueued: u64,
    /// Calls that ran and returned a value
    pub calls_completed: u64,
    /// Calls that ran and failed or panicked
    pub calls_failed: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Invoked under [`ExceptionPolicy::Terminate`] with the error that ended the
/// loop.
pub type Terminator = Arc<dyn Fn(&CallError) + Send + Sync>;

/// Logs the error and exits the process with status 1.
pub(crate) fn terminate_process() -> Terminator {
    Arc::new(|err: &CallError| {
        error!(error = %err, "Terminating process after slot failure");
        std::process::exit(1);
    })
}

enum Message {
    Call(DeferredCall),
    /// Wakes the loop so it re-checks the closing flag
    Wake,
}

enum ExecutionContext {
    Thread,
    Task(Handle),
}

struct Inner {
    id: SchedulerId,
    config: SchedulerConfig,
    context: ExecutionContext,
    state: Mutex<SchedulerState>,
    sender: mpsc::UnboundedSender<Message>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
    events: Events,
    finished: watch::Sender<bool>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
    terminator: RwLock<Terminator>,
    counters: Counters,
}

/// Handle to a per-owner event loop. Clones refer to the same loop.
///
/// Use [`Scheduler::exit`] to stop a loop. If every handle is dropped
/// instead, the loop ends after its current call without emitting `stopped`,
/// and calls still queued resolve to [`CallError::SchedulerStopped`]. Bindings
/// and listeners that capture a clone count as handles.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Creates a scheduler that runs on its own thread.
    pub fn thread(config: SchedulerConfig) -> Self {
        Self::with_context(config, ExecutionContext::Thread)
    }

    /// Creates a scheduler that runs as a task on `handle`'s runtime.
    pub fn task(config: SchedulerConfig, handle: Handle) -> Self {
        Self::with_context(config, ExecutionContext::Task(handle))
    }

    /// Creates a scheduler for the configured backend.
    ///
    /// # Arguments
    ///
    /// * `config` - Scheduler configuration
    /// * `handle` - Runtime for the task backend; ignored by the thread backend
    pub fn from_config(config: SchedulerConfig, handle: Option<Handle>) -> Result<Self, SchedulerError> {
        match config.backend {
            Backend::Thread => Ok(Self::thread(config)),
            Backend::Task => {
                let handle = handle.ok_or_else(|| SchedulerError::MissingRuntime {
                    scheduler: config.name.clone(),
                })?;
                Ok(Self::task(config, handle))
            }
        }
    }

    fn with_context(config: SchedulerConfig, context: ExecutionContext) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (finished, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                id: SchedulerId(Uuid::new_v4()),
                config,
                context,
                state: Mutex::new(SchedulerState::NotStarted),
                sender,
                receiver: Mutex::new(Some(receiver)),
                events: Events::new(LIFECYCLE_EVENTS),
                finished,
                thread: Mutex::new(None),
                terminator: RwLock::new(terminate_process()),
                counters: Counters::default(),
            }),
        }
    }

    pub fn id(&self) -> SchedulerId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SchedulerState {
        *lock(&self.inner.state)
    }

    /// One of the lifecycle signals listed in [`LIFECYCLE_EVENTS`].
    pub fn event(&self, name: &str) -> Option<Event> {
        self.inner.events.get(name)
    }

    /// Replaces what [`ExceptionPolicy::Terminate`] does after logging.
    pub fn set_terminator<F>(&self, terminator: F)
    where
        F: Fn(&CallError) + Send + Sync + 'static,
    {
        *write(&self.inner.terminator) = Arc::new(terminator);
    }

    /// True when called from inside this scheduler's loop.
    pub fn is_current(&self) -> bool {
        CURRENT
            .try_with(|id| *id == self.inner.id)
            .unwrap_or(false)
    }

    pub fn stats(&self) -> SchedulerStats {
        let counters = &self.inner.counters;
        SchedulerStats {
            calls_enqueued: counters.enqueued.load(Ordering::Relaxed),
            calls_completed: counters.completed.load(Ordering::Relaxed),
            calls_failed: counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Starts the loop on its execution context.
    ///
    /// # Returns
    ///
    /// `SchedulerError::AlreadyStarted` if the scheduler was entered before,
    /// or a spawn error if the execution context could not be created; in
    /// that case the scheduler is left stopped.
    pub fn enter(&self) -> Result<(), SchedulerError> {
        {
            let mut state = lock(&self.inner.state);
            if *state != SchedulerState::NotStarted {
                return Err(SchedulerError::AlreadyStarted {
                    scheduler: self.name().to_string(),
                });
            }
            *state = SchedulerState::Running;
        }

        let Some(receiver) = lock(&self.inner.receiver).take() else {
            return Err(SchedulerError::AlreadyStarted {
                scheduler: self.name().to_string(),
            });
        };

        let weak = Arc::downgrade(&self.inner);
        let id = self.inner.id;
        let name = self.name().to_string();
        match &self.inner.context {
            ExecutionContext::Thread => {
                let spawned = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(SchedulerError::Runtime)
                    .and_then(|runtime| {
                        std::thread::Builder::new()
                            .name(thread_name(self.name()))
                            .spawn(move || runtime.block_on(run_loop(weak, id, name, receiver)))
                            .map_err(SchedulerError::Spawn)
                    });
                match spawned {
                    Ok(thread) => *lock(&self.inner.thread) = Some(thread),
                    Err(err) => {
                        error!(scheduler = %self.name(), error = %err, "Failed to start scheduler");
                        *lock(&self.inner.state) = SchedulerState::Stopped;
                        self.inner.finished.send_replace(true);
                        return Err(err);
                    }
                }
            }
            ExecutionContext::Task(handle) => {
                handle.spawn(run_loop(weak, id, name, receiver));
            }
        }

        debug!(scheduler = %self.name(), backend = ?self.inner.config.backend, "Scheduler entered");
        Ok(())
    }

    /// Stops the scheduler once its queue has drained.
    ///
    /// Waits until the loop has finished, except when called from the
    /// scheduler's own context, where it only requests the stop. Calling it
    /// on a scheduler that never started resolves every queued call to
    /// [`CallError::SchedulerStopped`].
    pub async fn exit(&self) {
        let started = {
            let mut state = lock(&self.inner.state);
            match *state {
                SchedulerState::NotStarted => {
                    *state = SchedulerState::Stopped;
                    false
                }
                SchedulerState::Running => {
                    *state = SchedulerState::Closing;
                    let _ = self.inner.sender.send(Message::Wake);
                    true
                }
                SchedulerState::Closing | SchedulerState::Stopped => true,
            }
        };

        if !started {
            self.abandon_unstarted();
            return;
        }

        if self.is_current() {
            debug!(scheduler = %self.name(), "Exit requested from the scheduler's own context");
            return;
        }

        let mut finished = self.inner.finished.subscribe();
        let _ = finished.wait_for(|done| *done).await;

        let thread = lock(&self.inner.thread).take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                error!(scheduler = %self.name(), "Scheduler thread panicked");
            }
        }
    }

    /// Blocking form of [`Scheduler::exit`] for callers outside any runtime.
    ///
    /// Must not be used from a thread that drives a task-backed scheduler's
    /// runtime.
    pub fn exit_blocking(&self) {
        futures::executor::block_on(self.exit());
    }

    /// Runs `body` with the scheduler entered and exits afterwards.
    pub async fn run_scoped<F>(&self, body: F) -> Result<F::Output, SchedulerError>
    where
        F: Future,
    {
        self.enter()?;
        let output = body.await;
        self.exit().await;
        Ok(output)
    }

    /// Queues `slot` on this scheduler regardless of the slot's owner.
    pub fn submit(&self, slot: &Slot, args: Args) -> Result<Deferred, SchedulerError> {
        self.enqueue_call(slot.name().into(), slot.callable().clone(), args)
    }

    pub(crate) fn enqueue_call(
        &self,
        slot_name: CompactString,
        callable: Callable,
        args: Args,
    ) -> Result<Deferred, SchedulerError> {
        let (call, deferred) = DeferredCall::new(slot_name, callable, args);
        {
            let state = lock(&self.inner.state);
            if *state == SchedulerState::Stopped && !self.is_current() {
                return Err(self.stopped_error());
            }
            self.inner
                .sender
                .send(Message::Call(call))
                .map_err(|_| self.stopped_error())?;
        }
        self.inner.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        trace!(scheduler = %self.name(), slot = %deferred.slot_name(), "Call enqueued");
        Ok(deferred)
    }

    fn stopped_error(&self) -> SchedulerError {
        SchedulerError::Stopped {
            scheduler: self.name().to_string(),
        }
    }

    fn stopped_call_error(&self) -> CallError {
        CallError::SchedulerStopped {
            scheduler: self.name().to_string(),
        }
    }

    fn abandon_unstarted(&self) {
        let receiver = lock(&self.inner.receiver).take();
        if let Some(mut receiver) = receiver {
            while let Ok(message) = receiver.try_recv() {
                if let Message::Call(call) = message {
                    call.error(self.stopped_call_error());
                }
            }
        }
        self.inner.finished.send_replace(true);
    }

    /// Announces the start of the loop.
    fn begin(&self) {
        info!(scheduler = %self.name(), "Scheduler started");
        self.emit_lifecycle("started", Args::new());
        self.emit_lifecycle("idle", Args::new());
    }

    /// Runs one queued call. Returns true when the exception policy halts
    /// the loop.
    async fn execute(&self, call: DeferredCall) -> bool {
        self.emit_lifecycle("active", Args::new());
        let slot_name = call.slot_name().to_string();
        trace!(scheduler = %self.name(), slot = %slot_name, "Running queued call");

        match call.run().await {
            Ok(_) => {
                self.inner.counters.completed.fetch_add(1, Ordering::Relaxed);
                self.emit_lifecycle("idle", Args::new());
                false
            }
            Err(err) => {
                let halt = self.report_failure(&err, &slot_name);
                if !halt {
                    self.emit_lifecycle("idle", Args::new());
                }
                halt
            }
        }
    }

    /// Counts and reports a failed call, then applies the exception policy.
    /// Returns true when the loop must halt.
    fn report_failure(&self, err: &CallError, slot_name: &str) -> bool {
        self.inner.counters.failed.fetch_add(1, Ordering::Relaxed);
        error!(scheduler = %self.name(), slot = %slot_name, error = %err, "Queued call failed");
        self.emit_lifecycle("exception", args![err.to_string(), slot_name]);

        match self.inner.config.exception_policy {
            ExceptionPolicy::Continue => false,
            ExceptionPolicy::StopLoop => true,
            ExceptionPolicy::Terminate => {
                let terminator = read(&self.inner.terminator).clone();
                terminator(err);
                true
            }
        }
    }

    /// Marks the scheduler stopped, emits `stopped` and runs whatever its
    /// listeners queue from this context.
    async fn finish(&self, mut receiver: mpsc::UnboundedReceiver<Message>, mut halted: bool) {
        *lock(&self.inner.state) = SchedulerState::Stopped;
        if halted {
            let abandoned = abandon_queued(&mut receiver, self.name());
            if abandoned > 0 {
                warn!(scheduler = %self.name(), abandoned, "Scheduler halted with queued calls");
            }
        }

        info!(scheduler = %self.name(), "Scheduler stopped");
        self.emit_lifecycle("stopped", Args::new());

        while let Ok(message) = receiver.try_recv() {
            let Message::Call(call) = message else {
                continue;
            };
            if halted {
                call.error(self.stopped_call_error());
                continue;
            }
            let slot_name = call.slot_name().to_string();
            match call.run().await {
                Ok(_) => {
                    self.inner.counters.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => halted = self.report_failure(&err, &slot_name),
            }
        }

        drop(receiver);
        self.inner.finished.send_replace(true);
    }

    /// Takes the next message without waiting.
    ///
    /// The emptiness check and the transition to `Stopped` happen under the
    /// state lock that producers hold while sending, so no foreign call can
    /// slip in after the final check.
    fn poll_queue(&self, receiver: &mut mpsc::UnboundedReceiver<Message>) -> Poll {
        let mut state = lock(&self.inner.state);
        match receiver.try_recv() {
            Ok(message) => Poll::Ready(message),
            Err(TryRecvError::Empty) if *state == SchedulerState::Closing => {
                *state = SchedulerState::Stopped;
                Poll::Done
            }
            Err(TryRecvError::Disconnected) => {
                *state = SchedulerState::Stopped;
                Poll::Done
            }
            Err(TryRecvError::Empty) => Poll::Wait,
        }
    }

    fn emit_lifecycle(&self, name: &str, args: Args) {
        if let Some(event) = self.inner.events.get(name) {
            if let Err(err) = event.invoke(args) {
                warn!(scheduler = %self.name(), event = name, error = %err, "Lifecycle listener failed");
            }
        }
    }
}

enum Poll {
    Ready(Message),
    Wait,
    Done,
}

/// Drives a scheduler's queue on its execution context.
///
/// The loop only holds a weak reference while it waits for work. Once every
/// handle is dropped the queue's sender goes with it and the loop ends.
async fn run_loop(
    weak: Weak<Inner>,
    id: SchedulerId,
    name: String,
    receiver: mpsc::UnboundedReceiver<Message>,
) {
    CURRENT.scope(id, drive(weak, name, receiver)).await;
}

async fn drive(weak: Weak<Inner>, name: String, mut receiver: mpsc::UnboundedReceiver<Message>) {
    match upgrade(&weak) {
        Some(scheduler) => scheduler.begin(),
        None => return,
    }

    let mut halted = false;
    loop {
        let polled = match upgrade(&weak) {
            Some(scheduler) => scheduler.poll_queue(&mut receiver),
            None => Poll::Wait,
        };
        let message = match polled {
            Poll::Ready(message) => message,
            Poll::Done => break,
            Poll::Wait => match receiver.recv().await {
                Some(message) => message,
                None => break,
            },
        };
        let Message::Call(call) = message else {
            continue;
        };
        let Some(scheduler) = upgrade(&weak) else {
            call.error(CallError::SchedulerStopped {
                scheduler: name.clone(),
            });
            continue;
        };
        if scheduler.execute(call).await {
            halted = true;
            break;
        }
    }

    match upgrade(&weak) {
        Some(scheduler) => scheduler.finish(receiver, halted).await,
        None => {
            abandon_queued(&mut receiver, &name);
            debug!(scheduler = %name, "Scheduler dropped without exit");
        }
    }
}

fn upgrade(weak: &Weak<Inner>) -> Option<Scheduler> {
    weak.upgrade().map(|inner| Scheduler { inner })
}

/// Resolves every call still queued to `SchedulerStopped`.
fn abandon_queued(receiver: &mut mpsc::UnboundedReceiver<Message>, scheduler: &str) -> usize {
    let mut abandoned = 0usize;
    while let Ok(message) = receiver.try_recv() {
        if let Message::Call(call) = message {
            call.error(CallError::SchedulerStopped {
                scheduler: scheduler.to_string(),
            });
            abandoned += 1;
        }
    }
    abandoned
}

/// Thread names may not contain NUL bytes.
fn thread_name(name: &str) -> String {
    name.replace('\0', "")
}

impl Emitter for Scheduler {
    fn emitter_name(&self) -> &str {
        self.name()
    }

    fn signal(&self, name: &str) -> Option<SignalRef> {
        self.inner.events.get(name).map(SignalRef::Multi)
    }

    fn signal_names(&self) -> Vec<String> {
        self.inner.events.names()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("id", &self.inner.id)
            .field("name", &self.inner.config.name)
            .field("backend", &self.inner.config.backend)
            .field("state", &self.state())
            .finish()
    }
}

/// Shared, replaceable reference from an owner (and its slots) to the
/// owner's scheduler.
#[derive(Clone, Default)]
pub(crate) struct SchedulerCell {
    scheduler: Arc<RwLock<Option<Scheduler>>>,
}

impl SchedulerCell {
    pub(crate) fn new(scheduler: Option<Scheduler>) -> Self {
        Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
        }
    }

    pub(crate) fn set(&self, scheduler: Option<Scheduler>) {
        *write(&self.scheduler) = scheduler;
    }

    pub(crate) fn current(&self) -> Option<Scheduler> {
        read(&self.scheduler).clone()
    }
}
