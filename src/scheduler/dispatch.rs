//! Manual run dispatcher
//!
//! Manual runs are queued on a bounded channel and drained by a fixed pool
//! of workers, so a caller never waits for a pipeline. A full queue is
//! reported back instead of blocking.

use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::{SchedulerError, SchedulerResult};
use super::processor::TopicProcessor;
use crate::models::TopicId;

/// Bounded queue plus worker pool for manual topic runs
pub struct ManualDispatcher {
    sender: StdMutex<Option<mpsc::Sender<TopicId>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    capacity: usize,
}

impl ManualDispatcher {
    /// Spawn `workers` workers draining a queue of `capacity` runs
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(processor: Arc<TopicProcessor>, workers: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel::<TopicId>(capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..workers.max(1))
            .map(|worker| {
                let processor = Arc::clone(&processor);
                let receiver = Arc::clone(&receiver);
                tokio::spawn(async move {
                    loop {
                        let next = receiver.lock().await.recv().await;
                        let Some(topic_id) = next else {
                            break;
                        };
                        debug!(worker = worker, topic_id = topic_id, "Manual run picked up");
                        processor.run_single_topic(topic_id).await;
                    }
                    debug!(worker = worker, "Dispatcher worker exiting");
                })
            })
            .collect();

        Self {
            sender: StdMutex::new(Some(sender)),
            workers: Mutex::new(handles),
            capacity,
        }
    }

    /// Queue a manual run and return immediately
    ///
    /// # Errors
    ///
    /// `DispatchQueueFull` when every slot is taken, `DispatcherClosed`
    /// after [`shutdown`](Self::shutdown).
    pub fn submit(&self, topic_id: TopicId) -> SchedulerResult<()> {
        let guard = self
            .sender
            .lock()
            .map_err(|_| SchedulerError::DispatcherClosed)?;
        let sender = guard.as_ref().ok_or(SchedulerError::DispatcherClosed)?;

        sender.try_send(topic_id).map_err(|e| match e {
            TrySendError::Full(_) => {
                warn!(topic_id = topic_id, capacity = self.capacity, "Manual run queue full");
                SchedulerError::DispatchQueueFull {
                    capacity: self.capacity,
                }
            }
            TrySendError::Closed(_) => SchedulerError::DispatcherClosed,
        })?;

        info!(topic_id = topic_id, "Manual run queued");
        Ok(())
    }

    /// Runs waiting in the queue
    pub fn pending(&self) -> usize {
        self.sender
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|s| self.capacity - s.capacity()))
            .unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Close the queue and wait for queued runs to finish
    pub async fn shutdown(&self) {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(sender);

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Dispatcher worker ended abnormally");
            }
        }
        info!("Manual run dispatcher shut down");
    }
}
