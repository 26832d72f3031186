use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::executor::TaskId;

/// Concurrency-safe, write-once mapping from task id to the task's result.
///
/// Every write takes the lock exclusively. Ids of tasks whose job panicked are
/// kept alongside so lookups can tell "failed" apart from "not finished yet".
#[derive(Debug)]
pub struct ResultStore<R> {
    inner: Arc<Mutex<Entries<R>>>,
}

#[derive(Debug)]
struct Entries<R> {
    values: HashMap<TaskId, R>,
    failed: HashSet<TaskId>,
}

/// Lookup outcome for a single id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<R> {
    Done(R),
    Failed,
    Empty,
}

impl<R> ResultStore<R> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Entries {
                values: HashMap::new(),
                failed: HashSet::new(),
            })),
        }
    }

    /// Record a result. Returns `false` and leaves the existing entry untouched
    /// if the id was already written.
    pub async fn insert(&self, id: TaskId, value: R) -> bool {
        let mut guard = self.inner.lock().await;
        if guard.values.contains_key(&id) || guard.failed.contains(&id) {
            return false;
        }
        guard.values.insert(id, value);
        true
    }

    /// Mark a task as failed (its job panicked).
    pub async fn mark_failed(&self, id: TaskId) -> bool {
        let mut guard = self.inner.lock().await;
        if guard.values.contains_key(&id) {
            return false;
        }
        guard.failed.insert(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.values.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn failed(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.inner.lock().await.failed.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Move every stored value out, leaving the store empty.
    pub async fn take_all(&self) -> HashMap<TaskId, R> {
        std::mem::take(&mut self.inner.lock().await.values)
    }
}

impl<R: Clone> ResultStore<R> {
    pub async fn get(&self, id: TaskId) -> Slot<R> {
        let guard = self.inner.lock().await;
        if let Some(v) = guard.values.get(&id) {
            Slot::Done(v.clone())
        } else if guard.failed.contains(&id) {
            Slot::Failed
        } else {
            Slot::Empty
        }
    }

    pub async fn snapshot(&self) -> HashMap<TaskId, R> {
        self.inner.lock().await.values.clone()
    }
}

impl<R> Clone for ResultStore<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> Default for ResultStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_are_write_once() {
        let store = ResultStore::new();
        assert!(store.insert(7, "first").await);
        assert!(!store.insert(7, "second").await);
        assert_eq!(store.get(7).await, Slot::Done("first"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn failed_ids_are_distinct_from_missing() {
        let store: ResultStore<u32> = ResultStore::new();
        assert!(store.mark_failed(3).await);
        assert_eq!(store.get(3).await, Slot::Failed);
        assert_eq!(store.get(4).await, Slot::Empty);
        assert!(!store.insert(3, 1).await);
        assert_eq!(store.failed().await, vec![3]);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn concurrent_writers_all_land() {
        let store = ResultStore::new();
        let mut handles = Vec::new();
        for id in 0..64u64 {
            let s = store.clone();
            handles.push(tokio::spawn(async move { s.insert(id, id * 2).await }));
        }
        for h in handles {
            assert!(h.await.unwrap());
        }
        let all = store.take_all().await;
        assert_eq!(all.len(), 64);
        assert_eq!(all[&10], 20);
        assert!(store.is_empty().await);
    }
}
