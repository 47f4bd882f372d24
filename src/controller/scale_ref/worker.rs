//! # Async Worker
//!
//! A fixed-size pool of tasks draining one shared, unbounded FIFO queue.
//! Items are not deduplicated and no ordering holds across workers; handlers
//! must be idempotent. A failed item is logged and dropped, the next watch
//! event for the same object produces it again.

use crate::observability::metrics;
use async_trait::async_trait;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Processes one queued item
#[async_trait]
pub trait WorkerHandler<T>: Send + Sync + 'static {
    type Error: Display + Send;

    async fn handle(&self, item: T) -> Result<(), Self::Error>;
}

pub struct AsyncWorker<T> {
    name: String,
    sender: mpsc::UnboundedSender<T>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<T>>>,
}

impl<T> std::fmt::Debug for AsyncWorker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncWorker")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> AsyncWorker<T> {
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Queue an item; never blocks
    ///
    /// Returns `false` once every worker has stopped.
    pub fn add(&self, item: T) -> bool {
        match self.sender.send(item) {
            Ok(()) => {
                metrics::increment_label_queue_depth();
                true
            }
            Err(_closed) => {
                warn!(worker = %self.name, "Worker pool stopped, dropping item");
                false
            }
        }
    }

    /// Start `workers` tasks; they stop when `token` is cancelled
    pub fn run<H>(
        &self,
        workers: usize,
        handler: Arc<H>,
        token: CancellationToken,
    ) -> Vec<JoinHandle<()>>
    where
        H: WorkerHandler<T>,
    {
        info!(worker = %self.name, workers, "Starting async workers");
        (0..workers.max(1))
            .map(|id| {
                let name = self.name.clone();
                let receiver = Arc::clone(&self.receiver);
                let handler = Arc::clone(&handler);
                let token = token.clone();
                tokio::spawn(async move {
                    loop {
                        let next = {
                            let mut receiver = receiver.lock().await;
                            tokio::select! {
                                biased;
                                () = token.cancelled() => None,
                                item = receiver.recv() => item,
                            }
                        };
                        let Some(item) = next else {
                            break;
                        };
                        metrics::decrement_label_queue_depth();
                        if let Err(e) = handler.handle(item).await {
                            warn!(worker = %name, id, error = %e, "Failed to process item");
                        }
                    }
                    debug!(worker = %name, id, "Async worker stopped");
                })
            })
            .collect()
    }
}
