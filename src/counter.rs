use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Number of submitted tasks that have not finished yet.
///
/// All reads and writes go through atomics. Reaching zero wakes anyone parked
/// in [`CompletionCounter::wait_zero`].
#[derive(Debug, Default)]
pub struct CompletionCounter {
    outstanding: AtomicUsize,
    drained: Notify,
}

impl CompletionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new count.
    pub fn increment(&self) -> usize {
        self.outstanding.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the new count. Never goes below zero.
    pub fn decrement(&self) -> usize {
        match self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(1) => {
                self.drained.notify_waiters();
                0
            }
            Ok(prev) => prev - 1,
            Err(_) => {
                tracing::error!("completion counter decremented below zero");
                0
            }
        }
    }

    pub fn get(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn is_zero(&self) -> bool {
        self.get() == 0
    }

    /// Park until the count is observed at zero.
    pub async fn wait_zero(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent drop to zero is not missed.
            notified.as_mut().enable();
            if self.is_zero() {
                return;
            }
            notified.await;
        }
    }
}
