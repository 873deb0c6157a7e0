//! FairQueue - blocking round-robin queue partitioned by key
//!
//! Items are grouped by a caller-supplied key function. Within a key items
//! are FIFO; across keys service rotates, so one busy key cannot starve the
//! others. A key is in the rotation exactly while it has pending items.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

/// Returned by [`FairQueue::remove`] when nothing is pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue is empty")]
pub struct QueueEmpty;

type KeyFn<T, K> = Box<dyn Fn(&T) -> K + Send + Sync>;

struct Inner<T, K> {
    /// Pending items per key (only non-empty keys are present)
    queues: HashMap<K, VecDeque<T>>,
    /// Keys with pending items, in service order
    rotation: VecDeque<K>,
}

/// Round-robin multi-key queue
///
/// Producers call [`add`](Self::add) from any thread; a consumer awaits
/// [`take`](Self::take). Dropping a pending `take` future cancels it without
/// losing an item.
pub struct FairQueue<T, K = String> {
    inner: Mutex<Inner<T, K>>,
    len: AtomicUsize,
    available: Notify,
    key_fn: KeyFn<T, K>,
}

impl<T, K> FairQueue<T, K>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty queue partitioned by `key_fn`
    pub fn new(key_fn: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queues: HashMap::new(),
                rotation: VecDeque::new(),
            }),
            len: AtomicUsize::new(0),
            available: Notify::new(),
            key_fn: Box::new(key_fn),
        }
    }

    /// Append an item to its key's queue
    ///
    /// A key that had nothing pending joins the end of the rotation.
    pub fn add(&self, item: T) {
        let key = (self.key_fn)(&item);
        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            match inner.queues.entry(key) {
                Entry::Occupied(mut queue) => queue.get_mut().push_back(item),
                Entry::Vacant(slot) => {
                    inner.rotation.push_back(slot.key().clone());
                    slot.insert(VecDeque::from([item]));
                }
            }
            self.len.fetch_add(1, Ordering::SeqCst);
        }
        self.available.notify_one();
    }

    /// Remove the next item without waiting
    pub fn remove(&self) -> Result<T, QueueEmpty> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let key = inner.rotation.pop_front().ok_or(QueueEmpty)?;
        let Some(queue) = inner.queues.get_mut(&key) else {
            return Err(QueueEmpty);
        };
        let item = queue.pop_front().ok_or(QueueEmpty)?;

        if queue.is_empty() {
            inner.queues.remove(&key);
        } else {
            inner.rotation.push_back(key);
        }
        self.len.fetch_sub(1, Ordering::SeqCst);
        Ok(item)
    }

    /// Wait until an item is pending, then remove it
    pub async fn take(&self) -> T {
        loop {
            let notified = self.available.notified();
            if let Ok(item) = self.remove() {
                if !self.is_empty() {
                    // pass the wakeup on to any other waiting consumer
                    self.available.notify_one();
                }
                return item;
            }
            notified.await;
        }
    }

    /// Like [`take`](Self::take), but gives up after `timeout`
    pub async fn poll(&self, timeout: Duration) -> Option<T> {
        tokio::time::timeout(timeout, self.take()).await.ok()
    }

    /// Total pending items across all keys
    pub fn size(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of keys currently in the rotation
    pub fn key_count(&self) -> usize {
        self.inner.lock().rotation.len()
    }
}

impl<T, K> std::fmt::Debug for FairQueue<T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FairQueue")
            .field("len", &self.len.load(Ordering::SeqCst))
            .finish()
    }
}
