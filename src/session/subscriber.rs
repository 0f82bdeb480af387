//! Per-subscriber outbound buffers.
//!
//! The hub pushes into these without ever blocking the pipeline. Each
//! buffer is bounded; on overflow the oldest non-transcription message is
//! dropped first. Transcriptions are only sacrificed when a buffer is
//! entirely transcriptions, at which point the subscriber is lagging
//! beyond rescue and gets closed instead.

use crate::server::protocol::ServerMessage;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

/// Subscriber identity within one hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscriber-{}", self.0)
    }
}

/// Outcome of a push into a subscriber buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queued normally.
    Queued,
    /// Queued after evicting the oldest non-transcription message.
    DroppedOldest,
    /// The subscriber is closed (or was closed by this push for lagging).
    Closed,
}

struct BufferInner {
    queue: VecDeque<ServerMessage>,
    closed: bool,
    lagging: bool,
}

/// Bounded outbound message buffer for one subscriber.
pub struct SubscriberBuffer {
    inner: Mutex<BufferInner>,
    notify: Notify,
    capacity: usize,
}

impl SubscriberBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BufferInner {
                queue: VecDeque::new(),
                closed: false,
                lagging: false,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    /// Pushes a message without blocking, applying the overflow policy.
    pub fn push(&self, message: ServerMessage) -> PushOutcome {
        let outcome = {
            let mut inner = self.inner.lock().unwrap();
            if inner.closed {
                return PushOutcome::Closed;
            }

            if inner.queue.len() < self.capacity {
                inner.queue.push_back(message);
                PushOutcome::Queued
            } else if let Some(victim) = inner
                .queue
                .iter()
                .position(|queued| !queued.is_transcription())
            {
                inner.queue.remove(victim);
                inner.queue.push_back(message);
                PushOutcome::DroppedOldest
            } else if message.is_transcription() {
                // Full of transcriptions and another arrived: the
                // subscriber cannot keep up without losing transcript
                // continuity, so it is closed as lagging.
                inner.lagging = true;
                inner.closed = true;
                PushOutcome::Closed
            } else {
                // The incoming message is the only droppable one.
                PushOutcome::DroppedOldest
            }
        };
        self.notify.notify_one();
        outcome
    }

    /// Pops the next message, waiting for one. `None` once closed and
    /// drained.
    pub async fn next(&self) -> Option<ServerMessage> {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().unwrap();
                if let Some(message) = inner.queue.pop_front() {
                    return Some(message);
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    pub fn close(&self) {
        self.inner.lock().unwrap().closed = true;
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// Whether the buffer was closed for falling behind.
    pub fn is_lagging(&self) -> bool {
        self.inner.lock().unwrap().lagging
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
