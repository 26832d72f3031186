use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::counter::CompletionCounter;
use crate::queue::SharedReceiver;
use crate::store::ResultStore;

/// Worker loop: take the next task, run it to completion, store the result,
/// then count it as done. Exits once the queue is closed and empty.
pub(crate) async fn run_worker<R: Send + 'static>(
    worker: usize,
    rx: SharedReceiver<R>,
    store: ResultStore<R>,
    counter: Arc<CompletionCounter>,
) {
    loop {
        // The guard is released as soon as a task (or end-of-queue) is received.
        let next = rx.lock().await.recv().await;
        let Some(mut task) = next else {
            debug!(worker, "job queue closed, worker exiting");
            break;
        };

        let id = task.id;
        let description = std::mem::take(&mut task.description);

        // A panicking job must still be counted, so it runs on its own task.
        // The closure is called there too, not only the future it returns.
        match tokio::spawn(async move { task.into_future().await }).await {
            Ok(value) => {
                if !store.insert(id, value).await {
                    warn!(task = id, worker, "duplicate result for task discarded");
                }
                debug!(task = id, worker, %description, "task executed");
            }
            Err(err) => {
                error!(task = id, worker, %description, error = %err, "task failed");
                store.mark_failed(id).await;
            }
        }

        counter.decrement();
    }
}
