use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::error::ExecutorError;
use crate::executor::TaskId;

/// Default number of tasks the queue buffers before `submit` starts waiting.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

pub type BoxFuture<R> = Pin<Box<dyn Future<Output = R> + Send + 'static>>;

/// A job body: called once by whichever worker claims the task.
pub type Job<R> = Box<dyn FnOnce() -> BoxFuture<R> + Send + 'static>;

/// One unit of submitted work.
pub struct Task<R> {
    pub id: TaskId,
    pub description: String,
    job: Job<R>,
}

impl<R> Task<R> {
    pub fn new<F, Fut>(id: TaskId, job: F, description: impl Into<String>) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        Self {
            id,
            description: description.into(),
            job: Box::new(move || Box::pin(job()) as BoxFuture<R>),
        }
    }

    /// Consume the task, yielding the future that produces its result.
    pub fn into_future(self) -> BoxFuture<R> {
        (self.job)()
    }
}

impl<R> fmt::Debug for Task<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Receiving half shared by all workers. Whoever holds the lock is the next
/// consumer, which gives multi-consumer FIFO dispatch over a single-consumer
/// channel.
pub type SharedReceiver<R> = Arc<Mutex<mpsc::Receiver<Task<R>>>>;

/// Bounded multi-producer/multi-consumer queue of pending tasks.
///
/// `push` waits while the buffer is full. Closing drops the sending half, after
/// which workers keep receiving until the buffer is empty and then see `None`.
pub struct JobQueue<R> {
    tx: Mutex<Option<mpsc::Sender<Task<R>>>>,
    rx: SharedReceiver<R>,
    capacity: usize,
}

impl<R> JobQueue<R> {
    pub fn new(capacity: usize) -> Result<Self, ExecutorError> {
        if capacity == 0 {
            return Err(ExecutorError::InvalidConfiguration(
                "queue capacity must be at least 1".into(),
            ));
        }
        let (tx, rx) = mpsc::channel(capacity);
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            rx: Arc::new(Mutex::new(rx)),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn receiver(&self) -> SharedReceiver<R> {
        Arc::clone(&self.rx)
    }

    /// Enqueue a task, waiting for free space if the buffer is full.
    pub async fn push(&self, task: Task<R>) -> Result<(), ExecutorError> {
        // Clone out of the lock so a full buffer never blocks `close`.
        let tx = self
            .tx
            .lock()
            .await
            .clone()
            .ok_or(ExecutorError::QueueClosed)?;
        tx.send(task).await.map_err(|_| ExecutorError::QueueClosed)
    }

    /// Drop the sending half. Fails on the second call.
    pub async fn close(&self) -> Result<(), ExecutorError> {
        match self.tx.lock().await.take() {
            Some(tx) => {
                drop(tx);
                Ok(())
            }
            None => Err(ExecutorError::DoubleClose),
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.tx.lock().await.is_none()
    }
}

impl<R> fmt::Debug for JobQueue<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
