//! Background step that feeds the producer.

use crate::pipeline::Pipeline;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchboard_core::{SlotError, Work};
use tokio::sync::oneshot;

/// Asks the producer for one item per tick until `remaining` reaches zero,
/// then signals `done` and idles until stopped.
pub struct Ticker {
    pipeline: Arc<Pipeline>,
    interval: Duration,
    remaining: u64,
    produced: Arc<AtomicU64>,
    done: Option<oneshot::Sender<()>>,
}

impl Ticker {
    pub fn new(
        pipeline: Arc<Pipeline>,
        interval: Duration,
        items: u64,
        produced: Arc<AtomicU64>,
        done: oneshot::Sender<()>,
    ) -> Self {
        Self {
            pipeline,
            interval,
            remaining: items,
            produced,
            done: Some(done),
        }
    }
}

#[async_trait]
impl Work for Ticker {
    async fn step(&mut self) -> Result<(), SlotError> {
        tokio::time::sleep(self.interval).await;
        if self.remaining == 0 {
            return Ok(());
        }

        let reply = self.pipeline.produce().map_err(SlotError::failed)?;
        self.remaining -= 1;
        self.produced.fetch_add(1, Ordering::SeqCst);
        // Scheduled producers answer later; a direct one is awaited here.
        if !reply.is_deferred() {
            reply.await.map_err(SlotError::failed)?;
        }

        if self.remaining == 0 {
            if let Some(done) = self.done.take() {
                let _ = done.send(());
            }
        }
        Ok(())
    }
}
