//! The demonstration pipeline.
//!
//! A producer emits numbered products. Two processors each keep the parity
//! they handle and pass everything else along; kept items are labelled and
//! re-emitted through the `onProcessedResult` forwarding slot. The even
//! processor's results reach the consumer through the odd processor's
//! forwarding slot, so every stage is wired with the convention wildcard.
//!
//! ```text
//! producer ──result──▶ even ──result──────────▶ odd ──processed_result──▶ consumer
//!                           ──processed_result──▶
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use switchboard_core::{
    args, connect_all, Binding, Receiver, Reply, Scheduler, SlotError, Value,
    WiringError,
};
use tracing::{debug, info};

/// The four stages of the pipeline and what the consumer received.
pub struct Pipeline {
    producer: Binding,
    even: Binding,
    odd: Binding,
    consumer: Binding,
    consumed: Arc<Mutex<Vec<String>>>,
}

impl Pipeline {
    /// Builds and wires all stages.
    pub fn new() -> Result<Self, WiringError> {
        let producer = producer()?;
        let even = processor("even", 0)?;
        let odd = processor("odd", 1)?;
        let (consumer, consumed) = consumer()?;

        connect_all(&producer, &even)?;
        connect_all(&even, &odd)?;
        connect_all(&odd, &consumer)?;

        Ok(Self {
            producer,
            even,
            odd,
            consumer,
            consumed,
        })
    }

    /// Stages in data-flow order, producer first.
    pub fn stages(&self) -> [&Binding; 4] {
        [&self.producer, &self.even, &self.odd, &self.consumer]
    }

    /// Attaches `scheduler` to every stage.
    pub fn share_scheduler(&self, scheduler: &Scheduler) {
        for stage in self.stages() {
            stage.set_scheduler(Some(scheduler.clone()));
        }
    }

    /// Asks the producer for its next product.
    pub fn produce(&self) -> Result<Reply, WiringError> {
        self.producer.call_slot("produce", args![])
    }

    /// Everything the consumer has received so far, in arrival order.
    pub fn consumed(&self) -> Vec<String> {
        self.consumed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn producer() -> Result<Binding, WiringError> {
    let binding = Binding::builder("producer").emits(["result"]).build()?;
    let Some(result) = binding.event("result") else {
        return Err(WiringError::UnknownEvent {
            emitter: binding.name().to_string(),
            event: "result".to_string(),
        });
    };
    let counter = Arc::new(AtomicU64::new(0));

    binding.add_async_slot("produce", move |_| {
        let result = result.clone();
        let number = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            debug!(number, "Producing");
            result
                .invoke(args!["product", number])
                .map_err(SlotError::failed)?;
            Ok(Value::Null)
        }
    });
    Ok(binding)
}

fn processor(label: &'static str, parity: u64) -> Result<Binding, WiringError> {
    let binding = Binding::builder(label)
        .emits(["processed_result", "result"])
        .forwards(["onProcessedResult"])
        .build()?;
    let processed = Receiver::slot(&binding, "onProcessedResult").ok_or_else(|| {
        WiringError::UnknownSlot {
            receiver: label.to_string(),
            slot: "onProcessedResult".to_string(),
        }
    })?;
    let passed_on = binding
        .event("result")
        .ok_or_else(|| WiringError::UnknownEvent {
            emitter: label.to_string(),
            event: "result".to_string(),
        })?;

    binding.add_slot("onResult", move |args| {
        let product: String = args.arg(0)?;
        let number: u64 = args.arg(1)?;
        if number % 2 == parity {
            let labelled = format!("{product} {label} {number}");
            if let Reply::Ready(Err(err)) = processed.call(args![labelled]) {
                return Err(SlotError::failed(err));
            }
        } else {
            passed_on.invoke(args).map_err(SlotError::failed)?;
        }
        Ok(Value::Null)
    });
    Ok(binding)
}

fn consumer() -> Result<(Binding, Arc<Mutex<Vec<String>>>), WiringError> {
    let binding = Binding::builder("consumer").build()?;
    let consumed = Arc::new(Mutex::new(Vec::new()));
    let sink = consumed.clone();

    binding.add_slot("onProcessedResult", move |args| {
        let item: String = args.arg(0)?;
        info!(item = %item, "Consumed");
        sink.lock().unwrap_or_else(PoisonError::into_inner).push(item);
        Ok(Value::Null)
    });
    Ok((binding, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::SchedulerConfig;

    fn expected(count: u64) -> Vec<String> {
        (0..count)
            .map(|n| {
                let parity = if n % 2 == 0 { "even" } else { "odd" };
                format!("product {parity} {n}")
            })
            .collect()
    }

    #[test]
    fn test_direct_pipeline_preserves_order() {
        let pipeline = Pipeline::new().unwrap();
        for _ in 0..6 {
            pipeline.produce().unwrap().wait_blocking().unwrap();
        }
        assert_eq!(pipeline.consumed(), expected(6));
    }

    #[tokio::test]
    async fn test_shared_loop_pipeline() {
        let pipeline = Pipeline::new().unwrap();
        let shared = Scheduler::thread(SchedulerConfig::named("shared"));
        pipeline.share_scheduler(&shared);

        shared.enter().unwrap();
        for _ in 0..10 {
            pipeline.produce().unwrap();
        }
        shared.exit().await;

        let mut consumed = pipeline.consumed();
        consumed.sort();
        let mut wanted = expected(10);
        wanted.sort();
        assert_eq!(consumed, wanted);
    }
}
