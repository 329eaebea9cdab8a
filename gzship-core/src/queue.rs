//! Bounded FIFO channels wiring the coordinator to the upload workers and back.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::task::{Completion, FileTask};

/// Shared receiving end of the task queue.
///
/// Workers compete for tasks; the mutex only serialises who waits on the
/// channel next, so each task is delivered to exactly one worker.
#[derive(Debug, Clone)]
pub struct TaskReceiver {
    inner: Arc<Mutex<mpsc::Receiver<FileTask>>>,
}

impl TaskReceiver {
    fn new(rx: mpsc::Receiver<FileTask>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rx)),
        }
    }

    /// Wait for the next task. `None` once the coordinator has dropped its
    /// sender and the queue is drained.
    ///
    /// Cancel safe: dropping the future never loses a task.
    pub async fn recv(&self) -> Option<FileTask> {
        let mut rx = self.inner.lock().await;
        rx.recv().await
    }
}

/// Both ends of the task and completion queues.
#[derive(Debug)]
pub struct PipelineChannels {
    /// Coordinator side of the task queue.
    pub task_tx: mpsc::Sender<FileTask>,
    /// Shared worker side of the task queue.
    pub task_rx: TaskReceiver,
    /// Worker side of the completion queue.
    pub completion_tx: mpsc::Sender<Completion>,
    /// Coordinator side of the completion queue.
    pub completion_rx: mpsc::Receiver<Completion>,
}

impl PipelineChannels {
    /// Create both queues with the same capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, like [`mpsc::channel`].
    pub fn bounded(capacity: usize) -> Self {
        let (task_tx, task_rx) = mpsc::channel(capacity);
        let (completion_tx, completion_rx) = mpsc::channel(capacity);
        Self {
            task_tx,
            task_rx: TaskReceiver::new(task_rx),
            completion_tx,
            completion_rx,
        }
    }
}
