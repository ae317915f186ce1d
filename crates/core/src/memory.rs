//! In-process topic with real blocking and wakeup semantics.
//!
//! Broker transport is out of scope for this crate, but the loop and the
//! coordinator need something honest to run against. [`MemoryTopic`]
//! keeps a FIFO of records with per-partition offsets; its
//! [`MemoryClient`] blocks in `poll` until records arrive, the timeout
//! elapses (empty batch), or a wakeup lands; `close` commits the
//! delivered positions. Used by the reference daemon and by tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::client::{ConsumerClient, PollOutcome, Wakeup};
use crate::errors::ClientError;
use crate::message::Message;

struct Shared {
    name: String,
    inner: Mutex<Inner>,
    available: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Recover from poisoning; the queue state stays coherent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Default)]
struct Inner {
    queue: VecDeque<Message>,
    /// Next offset to assign, per partition.
    next_offset: HashMap<i32, i64>,
    /// Highest offset delivered to the consumer, per partition.
    delivered: HashMap<i32, i64>,
    /// Offsets committed by `close`, per partition.
    committed: HashMap<i32, i64>,
    /// A wakeup arrived and has not yet been consumed by a poll.
    woken: bool,
    closed: bool,
}

/// An in-process, single-consumer topic.
pub struct MemoryTopic {
    shared: Arc<Shared>,
}

impl MemoryTopic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                inner: Mutex::new(Inner::default()),
                available: Condvar::new(),
            }),
        }
    }

    /// The topic's name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Handle for appending records; cheap to clone across threads.
    pub fn producer(&self) -> MemoryProducer {
        MemoryProducer {
            shared: self.shared.clone(),
        }
    }

    /// The consuming side. `max_batch` bounds each poll's batch size.
    pub fn client(&self, max_batch: usize) -> MemoryClient {
        MemoryClient {
            shared: self.shared.clone(),
            max_batch: max_batch.max(1),
        }
    }

    /// Offsets committed so far (by `close`), per partition.
    ///
    /// Committed means the highest offset that had been delivered to the
    /// consumer when it closed; at-least-once, as a real broker commit.
    pub fn committed(&self) -> HashMap<i32, i64> {
        self.shared.lock().committed.clone()
    }
}

// ---------------------------------------------------------------------------
// Producer half
// ---------------------------------------------------------------------------

/// Appends records to a [`MemoryTopic`].
#[derive(Clone)]
pub struct MemoryProducer {
    shared: Arc<Shared>,
}

impl MemoryProducer {
    /// Append a record, assigning the partition's next offset. Returns it.
    pub fn send(&self, key: Option<String>, value: impl Into<String>, partition: i32) -> i64 {
        let mut inner = self.shared.lock();
        let slot = inner.next_offset.entry(partition).or_insert(0);
        let offset = *slot;
        *slot += 1;
        inner.queue.push_back(Message {
            key,
            value: value.into(),
            partition,
            offset,
        });
        self.shared.available.notify_all();
        offset
    }
}

// ---------------------------------------------------------------------------
// Consumer half
// ---------------------------------------------------------------------------

struct MemoryWaker {
    shared: Arc<Shared>,
}

impl Wakeup for MemoryWaker {
    fn wakeup(&self) {
        let mut inner = self.shared.lock();
        inner.woken = true;
        self.shared.available.notify_all();
    }
}

/// Blocking consumer over a [`MemoryTopic`].
pub struct MemoryClient {
    shared: Arc<Shared>,
    max_batch: usize,
}

impl ConsumerClient for MemoryClient {
    fn subscribe(&mut self, topics: &[String]) -> Result<(), ClientError> {
        let inner = self.shared.lock();
        if inner.closed {
            return Err(ClientError::AlreadyClosed);
        }
        if !topics.iter().any(|t| t == &self.shared.name) {
            return Err(ClientError::SubscribeFailed {
                topics: topics.to_vec(),
                detail: format!("topic '{}' is not served by this feed", self.shared.name),
            });
        }
        debug!(topic = %self.shared.name, "subscribed");
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> PollOutcome {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.lock();

        if inner.closed {
            return PollOutcome::Failed(ClientError::AlreadyClosed);
        }

        loop {
            // Wakeup wins over pending data: a cancelled consumer should
            // not start a fresh batch.
            if inner.woken {
                inner.woken = false;
                return PollOutcome::Cancelled;
            }

            if !inner.queue.is_empty() {
                let take = inner.queue.len().min(self.max_batch);
                let batch: Vec<Message> = inner.queue.drain(..take).collect();
                for message in &batch {
                    let position = inner.delivered.entry(message.partition).or_insert(-1);
                    if message.offset > *position {
                        *position = message.offset;
                    }
                }
                return PollOutcome::Batch(batch);
            }

            let now = Instant::now();
            if now >= deadline {
                return PollOutcome::Batch(Vec::new());
            }
            let (guard, _timed_out) = self
                .shared
                .available
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            inner = guard;
        }
    }

    fn waker(&self) -> Arc<dyn Wakeup> {
        Arc::new(MemoryWaker {
            shared: self.shared.clone(),
        })
    }

    fn close(&mut self) -> Result<(), ClientError> {
        let mut inner = self.shared.lock();
        if inner.closed {
            return Err(ClientError::AlreadyClosed);
        }
        inner.closed = true;
        let delivered = inner.delivered.clone();
        inner.committed.extend(delivered);
        debug!(topic = %self.shared.name, committed = ?inner.committed, "memory client closed");
        Ok(())
    }
}
