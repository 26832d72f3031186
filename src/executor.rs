//! Bounded-concurrency task executor.
//!
//! A fixed number of workers pull tasks from a bounded [`JobQueue`], run them,
//! and write each result into a shared [`ResultStore`] keyed by task id.
//!
//! Shutdown is a two-step protocol:
//!
//! 1. [`TaskExecutor::close`] stops accepting work, waits until every
//!    submitted task has completed, then closes the queue exactly once.
//! 2. [`TaskExecutor::block_on`] joins every worker. After it returns all
//!    results are in the store.
//!
//! ```no_run
//! # async fn demo() -> Result<(), pool_scan_rs::error::ExecutorError> {
//! use pool_scan_rs::executor::TaskExecutor;
//!
//! let exec = TaskExecutor::new(4)?;
//! let id = exec.submit(|| async { 6 * 7 }, "answer").await?;
//! exec.shutdown().await?;
//! assert_eq!(exec.result(id).await?, 42);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::counter::CompletionCounter;
use crate::error::ExecutorError;
use crate::queue::{JobQueue, Task, DEFAULT_QUEUE_CAPACITY};
use crate::store::{ResultStore, Slot};
use crate::worker::run_worker;

/// Identifier assigned to each task at submission, starting at 0.
pub type TaskId = u64;

/// Lifecycle of an executor. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// Workers running, queue open.
    Accepting,
    /// `close` has been called; remaining work is draining.
    Closing,
    /// Every worker has exited.
    Closed,
}

const ACCEPTING: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

impl ExecutorState {
    fn from_u8(v: u8) -> Self {
        match v {
            ACCEPTING => Self::Accepting,
            CLOSING => Self::Closing,
            _ => Self::Closed,
        }
    }
}

pub struct TaskExecutor<R> {
    queue: JobQueue<R>,
    store: ResultStore<R>,
    counter: Arc<CompletionCounter>,
    next_id: AtomicU64,
    state: AtomicU8,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl<R: Send + 'static> TaskExecutor<R> {
    /// Start `workers` workers over a queue of [`DEFAULT_QUEUE_CAPACITY`].
    pub fn new(workers: usize) -> Result<Self, ExecutorError> {
        Self::with_capacity(workers, DEFAULT_QUEUE_CAPACITY)
    }

    /// Start `workers` workers over a queue holding at most `capacity` pending
    /// tasks. Must be called from within a tokio runtime.
    pub fn with_capacity(workers: usize, capacity: usize) -> Result<Self, ExecutorError> {
        if workers == 0 {
            return Err(ExecutorError::InvalidConfiguration(
                "worker count must be at least 1".into(),
            ));
        }
        let runtime = Handle::try_current().map_err(|_| ExecutorError::NoRuntime)?;
        let queue = JobQueue::new(capacity)?;
        let store = ResultStore::new();
        let counter = Arc::new(CompletionCounter::new());

        let handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|worker| {
                runtime.spawn(run_worker(
                    worker,
                    queue.receiver(),
                    store.clone(),
                    Arc::clone(&counter),
                ))
            })
            .collect();
        debug!(workers, capacity, "task executor started");

        Ok(Self {
            queue,
            store,
            counter,
            next_id: AtomicU64::new(0),
            state: AtomicU8::new(ACCEPTING),
            workers: Mutex::new(handles),
            worker_count: workers,
        })
    }

    /// Queue a job and return its id. Waits while the queue is full.
    ///
    /// Fails with [`ExecutorError::QueueClosed`] once `close` has been called.
    pub async fn submit<F, Fut>(
        &self,
        job: F,
        description: impl Into<String>,
    ) -> Result<TaskId, ExecutorError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        // Counted before the state check and before it is queued: either
        // `close` sees this unit and waits for it, or this sees `Closing`.
        let pending = PendingSubmit::new(&self.counter);
        if self.state() != ExecutorState::Accepting {
            return Err(ExecutorError::QueueClosed);
        }
        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        let description = description.into();
        trace!(task = id, %description, "submitting task");

        self.queue.push(Task::new(id, job, description)).await?;
        pending.commit();
        Ok(id)
    }

    /// Like [`submit`](Self::submit) for a synchronous closure, which is run
    /// on tokio's blocking pool.
    pub async fn submit_blocking<F>(
        &self,
        job: F,
        description: impl Into<String>,
    ) -> Result<TaskId, ExecutorError>
    where
        F: FnOnce() -> R + Send + 'static,
    {
        self.submit(
            move || async move {
                match tokio::task::spawn_blocking(job).await {
                    Ok(value) => value,
                    // Blocking tasks are never aborted, so this is a panic.
                    Err(err) => std::panic::resume_unwind(err.into_panic()),
                }
            },
            description,
        )
        .await
    }

    /// Stop accepting work, wait for every submitted task to finish, then
    /// close the queue. A second call fails with [`ExecutorError::DoubleClose`].
    pub async fn close(&self) -> Result<(), ExecutorError> {
        self.state
            .compare_exchange(ACCEPTING, CLOSING, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ExecutorError::DoubleClose)?;

        self.counter.wait_zero().await;
        self.queue.close().await?;
        debug!(submitted = self.submitted(), "job queue closed");
        Ok(())
    }

    /// Join barrier: wait until every worker has seen the closed queue and
    /// exited. Requires a completed [`close`](Self::close).
    pub async fn block_on(&self) -> Result<(), ExecutorError> {
        if !self.queue.is_closed().await {
            return Err(ExecutorError::NotClosed);
        }

        // Held for the whole join so concurrent callers all wait on it.
        let mut workers = self.workers.lock().await;
        let mut failure = None;
        for (worker, handle) in workers.drain(..).enumerate() {
            if let Err(err) = handle.await {
                error!(worker, error = %err, "worker terminated abnormally");
                failure.get_or_insert(ExecutorError::WorkerPanicked { worker });
            }
        }
        self.state.store(CLOSED, Ordering::Release);
        debug!("all workers exited");

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// `close` followed by `block_on`.
    pub async fn shutdown(&self) -> Result<(), ExecutorError> {
        self.close().await?;
        self.block_on().await
    }

    /// Consume the executor and move its results out. Requires the pool to be
    /// drained.
    pub async fn into_results(self) -> Result<HashMap<TaskId, R>, ExecutorError> {
        self.ensure_drained()?;
        Ok(self.store.take_all().await)
    }
}

impl<R> TaskExecutor<R> {
    pub fn state(&self) -> ExecutorState {
        ExecutorState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// True iff no submitted task is still outstanding.
    pub fn is_drained(&self) -> bool {
        self.counter.is_zero()
    }

    pub fn outstanding(&self) -> usize {
        self.counter.get()
    }

    /// Number of ids handed out so far.
    pub fn submitted(&self) -> u64 {
        self.next_id.load(Ordering::Acquire)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Ids of tasks whose job panicked, ascending.
    pub async fn failed_tasks(&self) -> Vec<TaskId> {
        self.store.failed().await
    }

    fn ensure_drained(&self) -> Result<(), ExecutorError> {
        match self.counter.get() {
            0 => Ok(()),
            outstanding => Err(ExecutorError::NotDrained { outstanding }),
        }
    }
}

impl<R: Clone> TaskExecutor<R> {
    /// Snapshot of every stored result. Fails while tasks are outstanding.
    pub async fn results(&self) -> Result<HashMap<TaskId, R>, ExecutorError> {
        self.ensure_drained()?;
        Ok(self.store.snapshot().await)
    }

    /// Result of a single task.
    pub async fn result(&self, id: TaskId) -> Result<R, ExecutorError> {
        if id >= self.submitted() {
            return Err(ExecutorError::UnknownTask(id));
        }
        // Read before the store: results are written before the count drops.
        let drained = self.is_drained();
        match self.store.get(id).await {
            Slot::Done(value) => Ok(value),
            Slot::Failed => Err(ExecutorError::TaskFailed(id)),
            // Id was handed out but the task never reached the queue.
            Slot::Empty if drained => Err(ExecutorError::TaskFailed(id)),
            Slot::Empty => Err(ExecutorError::TaskPending(id)),
        }
    }
}

impl<R> fmt::Debug for TaskExecutor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("workers", &self.worker_count)
            .field("capacity", &self.queue.capacity())
            .field("state", &self.state())
            .field("submitted", &self.submitted())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

/// Holds one unit on the completion counter until the task is enqueued.
/// Dropped without `commit` (enqueue failed or the caller gave up while
/// waiting for space), it gives the unit back.
struct PendingSubmit<'a> {
    counter: &'a CompletionCounter,
    committed: bool,
}

impl<'a> PendingSubmit<'a> {
    fn new(counter: &'a CompletionCounter) -> Self {
        counter.increment();
        Self {
            counter,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingSubmit<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.counter.decrement();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_u8() {
        assert_eq!(ExecutorState::from_u8(ACCEPTING), ExecutorState::Accepting);
        assert_eq!(ExecutorState::from_u8(CLOSING), ExecutorState::Closing);
        assert_eq!(ExecutorState::from_u8(CLOSED), ExecutorState::Closed);
    }

    #[test]
    fn requires_a_runtime() {
        let err = TaskExecutor::<u32>::new(2).unwrap_err();
        assert_eq!(err, ExecutorError::NoRuntime);
    }

    #[tokio::test]
    async fn zero_workers_is_invalid() {
        let err = TaskExecutor::<u32>::new(0).unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn abandoned_submit_releases_its_count() {
        let exec = TaskExecutor::with_capacity(1, 1).unwrap();
        let (started_tx, started) = tokio::sync::oneshot::channel::<()>();
        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        // Occupies the only worker until released.
        exec.submit(
            move || async move {
                let _ = started_tx.send(());
                let _ = gate.await;
                0u8
            },
            "gate",
        )
        .await
        .unwrap();
        started.await.unwrap();
        exec.submit(|| async { 1u8 }, "buffered").await.unwrap();

        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            exec.submit(|| async { 2u8 }, "abandoned"),
        )
        .await;
        assert!(blocked.is_err());
        assert_eq!(exec.outstanding(), 2);

        release.send(()).unwrap();
        exec.shutdown().await.unwrap();
        assert_eq!(exec.result(2).await, Err(ExecutorError::TaskFailed(2)));
        assert_eq!(exec.results().await.unwrap().len(), 2);
    }
}
