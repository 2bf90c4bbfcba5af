//! FIFO task queue shared by the worker pool.
//!
//! # Design
//! - Unbounded: the discovery interval throttles producers, and nothing is
//!   ever dropped.
//! - Tracks outstanding tasks (enqueued and not yet finished) so shutdown
//!   can wait for the queue to drain.

use std::pin::pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use offload_telemetry::Metrics;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, Notify};

use crate::error::{EngineError, EngineResult};
use crate::task::Task;

/// Multi-consumer FIFO of pending tasks.
pub struct TaskQueue {
    sender: UnboundedSender<Task>,
    receiver: Mutex<UnboundedReceiver<Task>>,
    outstanding: AtomicUsize,
    idle: Notify,
    metrics: Metrics,
}

impl TaskQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new(metrics: Metrics) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            outstanding: AtomicUsize::new(0),
            idle: Notify::new(),
            metrics,
        }
    }

    /// Append a task.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::QueueClosed`] if the receiving side is gone.
    pub fn push(&self, task: Task) -> EngineResult<()> {
        let depth = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        if self.sender.send(task).is_err() {
            self.finish_one();
            return Err(EngineError::QueueClosed);
        }
        self.metrics.set_queue_depth(depth);
        Ok(())
    }

    /// Pop the next task, waiting at most `timeout`.
    pub async fn pop(&self, timeout: Duration) -> Option<Task> {
        tokio::time::timeout(timeout, async { self.receiver.lock().await.recv().await })
            .await
            .ok()
            .flatten()
    }

    /// Mark a popped task as finished.
    pub fn task_done(&self) {
        self.finish_one();
    }

    fn finish_one(&self) {
        let previous = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                Some(count.saturating_sub(1))
            })
            .unwrap_or(0);
        let remaining = previous.saturating_sub(1);
        self.metrics.set_queue_depth(remaining);
        if remaining == 0 {
            self.idle.notify_waiters();
        }
    }

    /// Tasks enqueued and not yet finished.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Wait until every enqueued task has finished.
    pub async fn wait_idle(&self) {
        loop {
            let mut notified = pin!(self.idle.notified());
            notified.as_mut().enable();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use offload_core::Item;
    use std::sync::Arc;

    fn task(id: &str) -> Task {
        Task::new(Item::new(id, id, format!("/d/{id}")), 0)
    }

    #[tokio::test]
    async fn pops_in_fifo_order() -> Result<()> {
        let queue = TaskQueue::new(Metrics::new()?);
        queue.push(task("a"))?;
        queue.push(task("b"))?;

        let first = queue.pop(Duration::from_millis(10)).await;
        let second = queue.pop(Duration::from_millis(10)).await;
        assert_eq!(first.map(|t| t.item().id.clone()).as_deref(), Some("a"));
        assert_eq!(second.map(|t| t.item().id.clone()).as_deref(), Some("b"));
        assert!(queue.pop(Duration::from_millis(10)).await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn wait_idle_returns_after_last_task_done() -> Result<()> {
        let metrics = Metrics::new()?;
        let queue = Arc::new(TaskQueue::new(metrics.clone()));
        queue.push(task("a"))?;
        queue.push(task("b"))?;
        assert_eq!(metrics.snapshot().queue_depth, 2);

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.wait_idle().await })
        };

        let _ = queue.pop(Duration::from_millis(10)).await;
        queue.task_done();
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        let _ = queue.pop(Duration::from_millis(10)).await;
        queue.task_done();
        tokio::time::timeout(Duration::from_secs(1), waiter).await??;
        assert_eq!(queue.outstanding(), 0);
        assert_eq!(metrics.snapshot().queue_depth, 0);
        Ok(())
    }

    #[tokio::test]
    async fn wait_idle_on_empty_queue_is_immediate() -> Result<()> {
        let queue = TaskQueue::new(Metrics::new()?);
        tokio::time::timeout(Duration::from_millis(50), queue.wait_idle()).await?;
        Ok(())
    }
}
