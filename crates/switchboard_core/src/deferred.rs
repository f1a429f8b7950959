//! # Deferred Calls
//!
//! A [`DeferredCall`] is a slot invocation sitting in a scheduler's queue. Its
//! caller holds the matching [`Deferred`] handle, which resolves exactly once:
//! to the handler's value, to the handler's error, or to an error put there by
//! the scheduler when the call can no longer run.
//!
//! The result travels through a `tokio::sync::watch` channel, so any number
//! of clones of the handle can await it from any thread, before or after it
//! resolves, and a call that is dropped without running resolves its waiters
//! to [`CallError::Abandoned`] instead of leaving them hanging.

use crate::args::Args;
use crate::error::CallError;
use crate::slot::{CallResult, Callable};
use compact_str::CompactString;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::IntoFuture;
use tokio::sync::watch;

/// A queued invocation together with the sender side of its result.
pub(crate) struct DeferredCall {
    slot_name: CompactString,
    callable: Callable,
    args: Args,
    outcome: watch::Sender<Option<CallResult>>,
}

impl DeferredCall {
    pub(crate) fn new(slot_name: CompactString, callable: Callable, args: Args) -> (Self, Deferred) {
        let (outcome, receiver) = watch::channel(None);
        let deferred = Deferred {
            slot_name: slot_name.clone(),
            outcome: receiver,
        };
        let call = Self {
            slot_name,
            callable,
            args,
            outcome,
        };
        (call, deferred)
    }

    pub(crate) fn slot_name(&self) -> &str {
        &self.slot_name
    }

    /// Runs the target, awaiting it if it is asynchronous, and publishes the
    /// result to every waiter.
    pub(crate) async fn run(self) -> CallResult {
        let DeferredCall {
            callable,
            args,
            outcome,
            ..
        } = self;
        let result = callable.call_direct(args).await;
        outcome.send_replace(Some(result.clone()));
        result
    }

    /// Resolves the call to `error` without running it.
    pub(crate) fn error(self, error: CallError) {
        self.outcome.send_replace(Some(Err(error)));
    }
}

/// Awaitable handle to the result of a queued call.
#[derive(Clone)]
pub struct Deferred {
    slot_name: CompactString,
    outcome: watch::Receiver<Option<CallResult>>,
}

impl Deferred {
    /// Name of the slot this call targets.
    pub fn slot_name(&self) -> &str {
        &self.slot_name
    }

    /// Waits for the call to resolve.
    ///
    /// Every waiter, including later calls on the same handle, observes the
    /// same value.
    pub async fn wait(&self) -> CallResult {
        let mut outcome = self.outcome.clone();
        // An error here only means the sender is gone; the value it left
        // behind (if any) is still readable.
        let _ = outcome.wait_for(Option::is_some).await;
        let resolved = outcome.borrow().clone();
        resolved.unwrap_or(Err(CallError::Abandoned))
    }

    /// Blocks the current thread until the call resolves.
    ///
    /// Must not be called from the thread that runs the owning scheduler.
    pub fn wait_blocking(&self) -> CallResult {
        futures::executor::block_on(self.wait())
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Returns the result if the call has already resolved.
    pub fn try_result(&self) -> Option<CallResult> {
        self.outcome.borrow().clone()
    }
}

impl IntoFuture for Deferred {
    type Output = CallResult;
    type IntoFuture = BoxFuture<'static, CallResult>;

    fn into_future(self) -> Self::IntoFuture {
        async move { self.wait().await }.boxed()
    }
}

impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("slot_name", &self.slot_name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::error::SlotError;
    use crate::slot::Slot;
    use serde_json::json;

    fn call_of(slot: &Slot, args: Args) -> (DeferredCall, Deferred) {
        DeferredCall::new(slot.name().into(), slot.callable().clone(), args)
    }

    #[tokio::test]
    async fn test_run_resolves_all_waiters() {
        let slot = Slot::new("upper", |args| {
            Ok(json!(args.arg::<String>(0)?.to_uppercase()))
        });
        let (call, deferred) = call_of(&slot, args!["abc"]);
        let other = deferred.clone();
        assert!(!deferred.is_resolved());

        let waiter = tokio::spawn(async move { other.await });
        assert_eq!(call.run().await, Ok(json!("ABC")));

        assert_eq!(waiter.await.unwrap(), Ok(json!("ABC")));
        assert_eq!(deferred.wait().await, Ok(json!("ABC")));
        assert_eq!(deferred.try_result(), Some(Ok(json!("ABC"))));
    }

    #[tokio::test]
    async fn test_async_target_is_awaited_before_resolving() {
        let slot = Slot::new_async("slow", |_| async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            Ok(json!("foo"))
        });
        let (call, deferred) = call_of(&slot, args![]);
        let _ = call.run().await;
        assert_eq!(deferred.try_result(), Some(Ok(json!("foo"))));
    }

    #[tokio::test]
    async fn test_error_path_and_abandonment() {
        let slot = Slot::new("fail", |_| Err(SlotError::failed("nope")));
        let (call, deferred) = call_of(&slot, args![]);
        call.error(CallError::SchedulerStopped {
            scheduler: "s".to_string(),
        });
        assert!(matches!(
            deferred.await,
            Err(CallError::SchedulerStopped { .. })
        ));

        let (call, deferred) = call_of(&slot, args![]);
        drop(call);
        assert_eq!(deferred.wait().await, Err(CallError::Abandoned));
    }

    #[test]
    fn test_wait_blocking_from_other_thread() {
        let slot = Slot::new("one", |_| Ok(json!(1)));
        let (call, deferred) = call_of(&slot, args![]);
        let runner = std::thread::spawn(move || futures::executor::block_on(call.run()));
        assert_eq!(deferred.wait_blocking(), Ok(json!(1)));
        runner.join().unwrap().unwrap();
    }
}
