//! Bounded queue between batcher and dispatcher.
//!
//! The batcher awaits space when the queue is full; the dispatcher is the
//! rate limiter. With a configured bound on that wait, the oldest queued
//! utterance is evicted instead (never the newest), preserving recency.
//! An evicted utterance loses its audio but not its place: the dispatcher
//! still receives a `Dropped` entry for its sequence number, so the
//! ordered transcript append can move past the gap instead of stalling
//! on a sequence that will never complete.

use crate::batch::types::Utterance;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// What the dispatcher pops, in batch-sequence order.
#[derive(Debug, Clone)]
pub enum QueueEntry {
    /// An utterance ready for transcription.
    Utterance(Utterance),
    /// An utterance shed while waiting for queue space. The audio is
    /// gone; the sequence number survives for gap accounting.
    Dropped { batch_seq: u64 },
}

struct QueueInner {
    ready: VecDeque<Utterance>,
    /// Sequence numbers of evicted utterances, older than anything in
    /// `ready`, delivered first.
    dropped: VecDeque<u64>,
}

/// Bounded FIFO of utterances awaiting transcription.
pub struct BatchQueue {
    inner: Mutex<QueueInner>,
    capacity: usize,
    /// Woken when an entry is pushed.
    items: Notify,
    /// Woken when space frees up.
    space: Notify,
    closed: AtomicBool,
}

impl BatchQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                ready: VecDeque::new(),
                dropped: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            items: Notify::new(),
            space: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Utterances currently holding queue capacity.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.ready.is_empty() && inner.dropped.is_empty()
    }

    fn try_push(&self, utterance: Utterance) -> Option<Utterance> {
        let mut inner = self.inner.lock().unwrap();
        if inner.ready.len() >= self.capacity {
            return Some(utterance);
        }
        inner.ready.push_back(utterance);
        None
    }

    /// Pushes an utterance, waiting for space if the queue is full.
    ///
    /// With an `enqueue_timeout`, a push that cannot complete in time
    /// evicts the oldest queued utterance to make room, logs the loss,
    /// and leaves a `Dropped` marker for the dispatcher.
    pub async fn push(&self, utterance: Utterance, enqueue_timeout: Option<Duration>) {
        let mut pending = utterance;
        let deadline = enqueue_timeout.map(|t| tokio::time::Instant::now() + t);

        loop {
            let space = self.space.notified();
            match self.try_push(pending) {
                None => {
                    self.items.notify_one();
                    return;
                }
                Some(rejected) => pending = rejected,
            }

            if self.closed.load(Ordering::SeqCst) {
                return;
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, space).await.is_err() {
                        let evicted = {
                            let mut inner = self.inner.lock().unwrap();
                            let victim = inner.ready.pop_front();
                            if let Some(victim) = &victim {
                                inner.dropped.push_back(victim.batch_seq);
                            }
                            inner.ready.push_back(pending);
                            victim.map(|u| u.batch_seq)
                        };
                        if let Some(batch_seq) = evicted {
                            tracing::warn!(
                                batch_seq,
                                "batch queue full, shedding oldest queued utterance"
                            );
                        }
                        self.items.notify_one();
                        return;
                    }
                }
                None => space.await,
            }
        }
    }

    /// Pops the next entry, waiting for one to arrive. Drop markers are
    /// delivered ahead of the utterances that outlived them.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<QueueEntry> {
        loop {
            let items = self.items.notified();
            {
                let mut inner = self.inner.lock().unwrap();
                if let Some(batch_seq) = inner.dropped.pop_front() {
                    return Some(QueueEntry::Dropped { batch_seq });
                }
                if let Some(utterance) = inner.ready.pop_front() {
                    drop(inner);
                    self.space.notify_one();
                    return Some(QueueEntry::Utterance(utterance));
                }
            }
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            items.await;
        }
    }

    /// Closes the queue; pending entries remain poppable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.items.notify_waiters();
        self.space.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn utterance(seq: u64) -> Utterance {
        Utterance {
            batch_seq: seq,
            samples: vec![0i16; 16],
            start_sample: seq * 16,
            end_sample: (seq + 1) * 16,
        }
    }

    async fn pop_utterance_seq(queue: &BatchQueue) -> u64 {
        match queue.pop().await {
            Some(QueueEntry::Utterance(utterance)) => utterance.batch_seq,
            other => panic!("expected a ready utterance, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_push_then_pop_fifo() {
        let queue = BatchQueue::new(10);
        queue.push(utterance(0), None).await;
        queue.push(utterance(1), None).await;

        assert_eq!(queue.len(), 2);
        assert_eq!(pop_utterance_seq(&queue).await, 0);
        assert_eq!(pop_utterance_seq(&queue).await, 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(BatchQueue::new(10));
        let popper = queue.clone();

        let task = tokio::spawn(async move { popper.pop().await });

        tokio::task::yield_now().await;
        queue.push(utterance(7), None).await;

        match task.await.unwrap() {
            Some(QueueEntry::Utterance(utterance)) => assert_eq!(utterance.batch_seq, 7),
            other => panic!("expected utterance, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_push_blocks_until_space() {
        let queue = Arc::new(BatchQueue::new(1));
        queue.push(utterance(0), None).await;

        let pusher = queue.clone();
        let task = tokio::spawn(async move {
            pusher.push(utterance(1), None).await;
        });

        tokio::task::yield_now().await;
        assert_eq!(queue.len(), 1);

        // Popping frees space and the pending push completes.
        assert_eq!(pop_utterance_seq(&queue).await, 0);
        task.await.unwrap();
        assert_eq!(pop_utterance_seq(&queue).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_push_evicts_oldest_and_leaves_marker() {
        let queue = BatchQueue::new(2);
        queue.push(utterance(0), None).await;
        queue.push(utterance(1), None).await;

        // No consumer; the timed push must evict seq 0, never seq 2.
        queue
            .push(utterance(2), Some(Duration::from_millis(50)))
            .await;

        // The evicted sequence surfaces first, then the survivors.
        match queue.pop().await {
            Some(QueueEntry::Dropped { batch_seq }) => assert_eq!(batch_seq, 0),
            other => panic!("expected drop marker, got {other:?}"),
        }
        assert_eq!(pop_utterance_seq(&queue).await, 1);
        assert_eq!(pop_utterance_seq(&queue).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_evictions_keep_every_sequence() {
        let queue = BatchQueue::new(1);
        queue.push(utterance(0), None).await;
        queue
            .push(utterance(1), Some(Duration::from_millis(10)))
            .await;
        queue
            .push(utterance(2), Some(Duration::from_millis(10)))
            .await;
        queue.close();

        // Every sequence number comes back out, dropped or not.
        let mut seqs = Vec::new();
        while let Some(entry) = queue.pop().await {
            match entry {
                QueueEntry::Dropped { batch_seq } => seqs.push((batch_seq, true)),
                QueueEntry::Utterance(utterance) => seqs.push((utterance.batch_seq, false)),
            }
        }
        assert_eq!(seqs, vec![(0, true), (1, true), (2, false)]);
    }

    #[tokio::test]
    async fn test_pop_returns_none_after_close_and_drain() {
        let queue = BatchQueue::new(4);
        queue.push(utterance(0), None).await;
        queue.close();

        assert_eq!(pop_utterance_seq(&queue).await, 0);
        assert!(queue.pop().await.is_none());
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_popper() {
        let queue = Arc::new(BatchQueue::new(4));
        let popper = queue.clone();

        let task = tokio::spawn(async move { popper.pop().await });
        tokio::task::yield_now().await;
        queue.close();

        assert!(task.await.unwrap().is_none());
    }
}
