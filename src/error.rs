use thiserror::Error;

use crate::executor::TaskId;

/// Errors raised by the task executor when it is misconfigured or misused.
///
/// Contract violations (closing twice, reading results before the pool has
/// drained, joining before closing) are reported here rather than silently
/// returning stale data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("invalid executor configuration: {0}")]
    InvalidConfiguration(String),

    #[error("task executor must be created inside a tokio runtime")]
    NoRuntime,

    #[error("job queue is closed; no further tasks are accepted")]
    QueueClosed,

    #[error("job queue was already closed")]
    DoubleClose,

    #[error("block_on called before close; workers would never exit")]
    NotClosed,

    #[error("results requested while {outstanding} task(s) are still outstanding")]
    NotDrained { outstanding: usize },

    #[error("task {0} has not completed yet")]
    TaskPending(TaskId),

    #[error("task {0} was never submitted")]
    UnknownTask(TaskId),

    #[error("task {0} panicked and produced no result")]
    TaskFailed(TaskId),

    #[error("worker {worker} terminated abnormally")]
    WorkerPanicked { worker: usize },
}
