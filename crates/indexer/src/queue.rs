//! In-process work queue.
//!
//! Bounded, and submission never waits: when the queue is full the item is
//! dropped with a warning. A reference already waiting in the queue with the
//! same primary/discovered status is not queued twice.

use crate::services::WorkQueue;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use xref_protocol::{RepositoryReference, WorkItem};

type PendingKey = (RepositoryReference, bool);

#[derive(Default)]
struct Pending {
    keys: Mutex<HashSet<PendingKey>>,
}

impl Pending {
    fn lock(&self) -> MutexGuard<'_, HashSet<PendingKey>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn key(item: &WorkItem) -> PendingKey {
    (item.reference.clone(), item.origin.is_primary())
}

#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<WorkItem>,
    pending: Arc<Pending>,
}

pub struct QueueReceiver {
    rx: mpsc::Receiver<WorkItem>,
    pending: Arc<Pending>,
}

#[must_use]
pub fn work_queue(capacity: usize) -> (QueueHandle, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let pending = Arc::new(Pending::default());
    (
        QueueHandle {
            tx,
            pending: pending.clone(),
        },
        QueueReceiver { rx, pending },
    )
}

impl QueueHandle {
    /// Number of items waiting to be picked up.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Submit `item`. Returns `false` when it was not queued (duplicate, full
    /// or closed).
    pub fn submit(&self, item: WorkItem) -> bool {
        let key = key(&item);
        {
            let mut pending = self.pending.lock();
            if !pending.insert(key.clone()) {
                log::debug!("already queued repo={}", item.reference);
                return false;
            }
        }

        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(item)) => {
                log::warn!("work queue full, dropping repo={}", item.reference);
                self.pending.lock().remove(&key);
                false
            }
            Err(mpsc::error::TrySendError::Closed(item)) => {
                log::warn!("work queue closed, dropping repo={}", item.reference);
                self.pending.lock().remove(&key);
                false
            }
        }
    }
}

impl WorkQueue for QueueHandle {
    fn enqueue(&self, item: WorkItem) {
        self.submit(item);
    }
}

impl QueueReceiver {
    pub async fn recv(&mut self) -> Option<WorkItem> {
        let item = self.rx.recv().await?;
        self.pending.lock().remove(&key(&item));
        Some(item)
    }

    /// Take the next item if one is ready.
    pub fn try_recv(&mut self) -> Option<WorkItem> {
        let item = self.rx.try_recv().ok()?;
        self.pending.lock().remove(&key(&item));
        Some(item)
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xref_protocol::{Origin, RepoName};

    fn primary(name: &str) -> WorkItem {
        WorkItem::primary(RepositoryReference::default_branch(name))
    }

    fn discovered(name: &str) -> WorkItem {
        WorkItem::discovered(
            RepositoryReference::default_branch(name),
            Origin::Primary.child(RepoName::from("github.com/a/app")),
        )
    }

    #[tokio::test]
    async fn deduplicates_pending_items() {
        let (handle, mut rx) = work_queue(8);
        assert!(handle.submit(primary("github.com/a/b")));
        assert!(!handle.submit(primary("github.com/a/b")));
        assert!(handle.submit(discovered("github.com/a/b")));
        assert_eq!(handle.pending(), 2);

        assert_eq!(rx.recv().await, Some(primary("github.com/a/b")));
        assert_eq!(rx.pending(), 1);
        assert_eq!(rx.try_recv(), Some(discovered("github.com/a/b")));
        assert_eq!(rx.try_recv(), None);

        // Once dequeued, the same reference can be queued again.
        assert!(handle.submit(primary("github.com/a/b")));
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let (handle, mut rx) = work_queue(1);
        assert!(handle.submit(primary("github.com/a/one")));
        assert!(!handle.submit(primary("github.com/a/two")));
        assert_eq!(handle.pending(), 1);

        assert_eq!(rx.recv().await, Some(primary("github.com/a/one")));
        assert!(handle.submit(primary("github.com/a/two")));
    }

    #[tokio::test]
    async fn closed_queue_rejects() {
        let (handle, rx) = work_queue(4);
        drop(rx);
        handle.enqueue(primary("github.com/a/b"));
        assert_eq!(handle.pending(), 0);
    }
}
