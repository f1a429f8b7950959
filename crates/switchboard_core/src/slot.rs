//! # Slots
//!
//! A [`Slot`] is a named, cheaply clonable handler that can be attached to any
//! number of signals. Slots come in three flavours:
//!
//! - synchronous closures returning a [`SlotResult`]
//! - asynchronous closures returning a future of a [`SlotResult`]
//! - forwarding slots that re-emit an owner's own event
//!
//! A slot created through a [`crate::Binding`] remembers its owner. When that
//! owner has a scheduler attached, calling the slot does not run the handler;
//! the call is queued on the scheduler and the caller receives a
//! [`Reply::Deferred`] handle instead of the real result.

use crate::args::{Args, Value};
use crate::deferred::Deferred;
use crate::error::{CallError, SlotError};
use crate::events::Event;
use crate::scheduler::SchedulerCell;
use crate::utils::panic_message;
use compact_str::CompactString;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use std::future::{Future, IntoFuture};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Value produced by a handler.
pub type SlotResult = Result<Value, SlotError>;

/// Value observed by whoever called or awaited a slot.
pub type CallResult = Result<Value, CallError>;

type SyncHandler = Arc<dyn Fn(Args) -> SlotResult + Send + Sync>;
type AsyncHandler = Arc<dyn Fn(Args) -> BoxFuture<'static, SlotResult> + Send + Sync>;

/// The executable part of a slot.
#[derive(Clone)]
pub(crate) enum Callable {
    Sync(SyncHandler),
    Async(AsyncHandler),
    Forward(Event),
}

impl Callable {
    /// Runs the handler in the caller's context.
    ///
    /// Panics are contained and reported as [`SlotError::Panicked`], both while
    /// building an asynchronous handler's future and while polling it.
    pub(crate) fn call_direct(&self, args: Args) -> Reply {
        match self {
            Callable::Sync(handler) => match catch_unwind(AssertUnwindSafe(|| handler(args))) {
                Ok(result) => Reply::Ready(result.map_err(CallError::from)),
                Err(payload) => Reply::Ready(Err(panicked(payload.as_ref()))),
            },
            Callable::Async(handler) => {
                let fut = match catch_unwind(AssertUnwindSafe(|| handler(args))) {
                    Ok(fut) => fut,
                    Err(payload) => return Reply::Ready(Err(panicked(payload.as_ref()))),
                };
                Reply::Pending(
                    async move {
                        match AssertUnwindSafe(fut).catch_unwind().await {
                            Ok(result) => result.map_err(CallError::from),
                            Err(payload) => Err(panicked(payload.as_ref())),
                        }
                    }
                    .boxed(),
                )
            }
            Callable::Forward(event) => Reply::Ready(event.invoke(args).map(|()| Value::Null)),
        }
    }
}

fn panicked(payload: &(dyn std::any::Any + Send)) -> CallError {
    SlotError::Panicked(panic_message(payload)).into()
}

/// The outcome of calling a slot or a bilateral event.
///
/// Every variant can be awaited and yields a [`CallResult`].
pub enum Reply {
    /// The handler ran to completion in the caller's context
    Ready(CallResult),
    /// The handler is asynchronous and has not been polled yet
    Pending(BoxFuture<'static, CallResult>),
    /// The call was queued on the owner's scheduler
    Deferred(Deferred),
}

impl Reply {
    pub fn is_ready(&self) -> bool {
        matches!(self, Reply::Ready(_))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Reply::Deferred(_))
    }

    /// Returns the deferred handle if the call was queued.
    pub fn deferred(&self) -> Option<&Deferred> {
        match self {
            Reply::Deferred(deferred) => Some(deferred),
            _ => None,
        }
    }

    /// Blocks the current thread until the result is available.
    ///
    /// Must not be called from a thread that drives the scheduler the call
    /// was queued on. Pending futures that rely on tokio timers or I/O need a
    /// runtime and should be awaited instead.
    pub fn wait_blocking(self) -> CallResult {
        futures::executor::block_on(self.into_future())
    }
}

impl IntoFuture for Reply {
    type Output = CallResult;
    type IntoFuture = BoxFuture<'static, CallResult>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Reply::Ready(result) => future::ready(result).boxed(),
            Reply::Pending(fut) => fut,
            Reply::Deferred(deferred) => async move { deferred.wait().await }.boxed(),
        }
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Reply::Pending(_) => f.debug_tuple("Pending").field(&"[future]").finish(),
            Reply::Deferred(deferred) => f.debug_tuple("Deferred").field(deferred).finish(),
        }
    }
}

struct SlotInner {
    name: CompactString,
    callable: Callable,
    owner: Option<SchedulerCell>,
}

/// A named handler that can be attached to signals.
///
/// Clones share the same handler; two slots are equal only when they are
/// clones of each other, which is what listener removal relies on.
#[derive(Clone)]
pub struct Slot {
    inner: Arc<SlotInner>,
}

impl Slot {
    /// Creates a slot from a synchronous handler.
    pub fn new<F>(name: impl Into<CompactString>, handler: F) -> Self
    where
        F: Fn(Args) -> SlotResult + Send + Sync + 'static,
    {
        Self::from_parts(name.into(), Callable::Sync(Arc::new(handler)), None)
    }

    /// Creates a slot from an asynchronous handler.
    ///
    /// When the slot runs on a scheduler the future is awaited by the
    /// scheduler before the next queued call starts.
    pub fn new_async<F, Fut>(name: impl Into<CompactString>, handler: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SlotResult> + Send + 'static,
    {
        let handler: AsyncHandler = Arc::new(move |args| handler(args).boxed());
        Self::from_parts(name.into(), Callable::Async(handler), None)
    }

    /// Creates a slot that re-emits `event` with the arguments it receives.
    pub(crate) fn forwarding(name: impl Into<CompactString>, event: Event) -> Self {
        Self::from_parts(name.into(), Callable::Forward(event), None)
    }

    pub(crate) fn owned(name: CompactString, callable: Callable, owner: SchedulerCell) -> Self {
        Self::from_parts(name, callable, Some(owner))
    }

    fn from_parts(name: CompactString, callable: Callable, owner: Option<SchedulerCell>) -> Self {
        Self {
            inner: Arc::new(SlotInner {
                name,
                callable,
                owner,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// True when the slot's owner currently has a scheduler attached.
    pub fn is_scheduled(&self) -> bool {
        self.inner
            .owner
            .as_ref()
            .is_some_and(|owner| owner.current().is_some())
    }

    /// Calls the slot.
    ///
    /// Runs the handler directly unless the owner has a scheduler attached,
    /// in which case the call is queued and a [`Reply::Deferred`] is
    /// returned. A stopped scheduler refuses foreign calls with
    /// [`CallError::SchedulerStopped`].
    pub fn call(&self, args: Args) -> Reply {
        if let Some(scheduler) = self.inner.owner.as_ref().and_then(SchedulerCell::current) {
            return match scheduler.enqueue_call(
                self.inner.name.clone(),
                self.inner.callable.clone(),
                args,
            ) {
                Ok(deferred) => Reply::Deferred(deferred),
                Err(err) => Reply::Ready(Err(err.into())),
            };
        }
        self.inner.callable.call_direct(args)
    }

    /// Runs the handler in the caller's context, ignoring any scheduler.
    pub fn call_direct(&self, args: Args) -> Reply {
        self.inner.callable.call_direct(args)
    }

    pub(crate) fn callable(&self) -> &Callable {
        &self.inner.callable
    }

    /// True when both handles refer to the same slot.
    pub fn same_as(&self, other: &Slot) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Slot {}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.inner.callable {
            Callable::Sync(_) => "sync",
            Callable::Async(_) => "async",
            Callable::Forward(_) => "forward",
        };
        f.debug_struct("Slot")
            .field("name", &self.inner.name)
            .field("kind", &kind)
            .field("owned", &self.inner.owner.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use serde_json::json;

    #[tokio::test]
    async fn test_sync_slot_runs_directly() {
        let slot = Slot::new("double", |args| Ok(json!(args.arg::<i64>(0)? * 2)));
        let reply = slot.call(args![21]);
        assert!(reply.is_ready());
        assert_eq!(reply.await, Ok(json!(42)));
    }

    #[tokio::test]
    async fn test_async_slot_is_pending_until_awaited() {
        let slot = Slot::new_async("echo", |args: Args| async move {
            tokio::task::yield_now().await;
            Ok(args.get(0).cloned().unwrap_or(Value::Null))
        });
        let reply = slot.call(args!["hi"]);
        assert!(matches!(reply, Reply::Pending(_)));
        assert_eq!(reply.await, Ok(json!("hi")));
    }

    #[tokio::test]
    async fn test_panics_are_contained() {
        let slot = Slot::new("boom", |_| panic!("sync boom"));
        assert_eq!(
            slot.call(args![]).await,
            Err(CallError::Slot(SlotError::Panicked("sync boom".to_string())))
        );

        let slot = Slot::new_async("boom", |args: Args| async move {
            if args.is_empty() {
                panic!("async boom");
            }
            Ok(Value::Null)
        });
        assert_eq!(
            slot.call(args![]).await,
            Err(CallError::Slot(SlotError::Panicked("async boom".to_string())))
        );
    }

    #[test]
    fn test_identity_equality() {
        let a = Slot::new("same", |_| Ok(Value::Null));
        let b = Slot::new("same", |_| Ok(Value::Null));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(!a.is_scheduled());
    }

    #[test]
    fn test_forwarding_slot_reemits() {
        let target = Event::new("processed");
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        target.add_listener(&Slot::new("sink", move |args| {
            sink.lock().unwrap().push(args);
            Ok(Value::Null)
        }));

        let forward = Slot::forwarding("onProcessed", target);
        assert_eq!(forward.call(args!["x"]).wait_blocking(), Ok(Value::Null));
        assert_eq!(*seen.lock().unwrap(), vec![args!["x"]]);
    }
}
