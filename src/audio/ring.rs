//! Fixed-duration ring buffer over the capture stream.
//!
//! A single writer (the capture thread) appends samples; readers follow
//! with their own cursors on an absolute sample clock. Writes never block:
//! when the ring is full the oldest samples are overwritten, and a reader
//! whose cursor fell out of the window is told so via the `truncated` flag
//! rather than being handed a glitched splice.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Result of a cursor read against the ring.
#[derive(Debug, Clone)]
pub struct RingRead {
    /// Samples written since the cursor, in capture order.
    pub samples: Vec<i16>,
    /// Cursor to pass to the next read.
    pub next_cursor: u64,
    /// True when the cursor had already been overwritten; `samples` then
    /// holds the full remaining window and the reader should resynchronize.
    pub truncated: bool,
}

struct RingInner {
    buf: Vec<i16>,
    /// Absolute number of samples ever written; doubles as the sample clock.
    write_pos: u64,
}

/// Single-writer, cursor-reader audio ring.
pub struct AudioRing {
    inner: Mutex<RingInner>,
    notify: Notify,
    capacity: usize,
    sample_rate: u32,
    closed: AtomicBool,
}

impl AudioRing {
    /// Creates a ring holding `capacity_secs` seconds of audio.
    pub fn new(sample_rate: u32, capacity_secs: f64) -> Self {
        let capacity = (capacity_secs * sample_rate as f64) as usize;
        Self {
            inner: Mutex::new(RingInner {
                buf: vec![0; capacity.max(1)],
                write_pos: 0,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
            sample_rate,
            closed: AtomicBool::new(false),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Absolute write position (total samples captured so far).
    pub fn write_pos(&self) -> u64 {
        self.inner.lock().unwrap().write_pos
    }

    /// Appends samples, overwriting the oldest if the ring is full.
    pub fn write(&self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }
        {
            let mut inner = self.inner.lock().unwrap();
            // A write larger than the ring only keeps its tail.
            let samples = if samples.len() > self.capacity {
                let skip = samples.len() - self.capacity;
                inner.write_pos += skip as u64;
                &samples[skip..]
            } else {
                samples
            };
            for &sample in samples {
                let idx = (inner.write_pos % self.capacity as u64) as usize;
                inner.buf[idx] = sample;
                inner.write_pos += 1;
            }
        }
        self.notify.notify_waiters();
    }

    /// Reads everything written since `cursor`.
    pub fn read_since(&self, cursor: u64) -> RingRead {
        let inner = self.inner.lock().unwrap();
        let end = inner.write_pos;
        let window_start = end.saturating_sub(self.capacity as u64);
        let start = cursor.max(window_start);
        let truncated = cursor < window_start;

        let mut samples = Vec::with_capacity((end - start) as usize);
        for pos in start..end {
            samples.push(inner.buf[(pos % self.capacity as u64) as usize]);
        }

        RingRead {
            samples,
            next_cursor: end,
            truncated,
        }
    }

    /// Waits until data beyond `cursor` is available or the ring closes.
    ///
    /// Returns false when the ring closed with nothing left to read.
    pub async fn wait_for_data(&self, cursor: u64) -> bool {
        loop {
            let notified = self.notify.notified();
            if self.write_pos() > cursor {
                return true;
            }
            if self.is_closed() {
                return false;
            }
            notified.await;
        }
    }

    /// Marks the stream finished and wakes all waiting readers.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_write_then_read() {
        let ring = AudioRing::new(16000, 1.0);
        ring.write(&[1, 2, 3, 4]);

        let read = ring.read_since(0);
        assert_eq!(read.samples, vec![1, 2, 3, 4]);
        assert_eq!(read.next_cursor, 4);
        assert!(!read.truncated);
    }

    #[test]
    fn test_incremental_reads() {
        let ring = AudioRing::new(16000, 1.0);
        ring.write(&[1, 2]);

        let first = ring.read_since(0);
        assert_eq!(first.samples, vec![1, 2]);

        ring.write(&[3, 4]);
        let second = ring.read_since(first.next_cursor);
        assert_eq!(second.samples, vec![3, 4]);
        assert!(!second.truncated);
    }

    #[test]
    fn test_read_with_no_new_data_is_empty() {
        let ring = AudioRing::new(16000, 1.0);
        ring.write(&[1, 2, 3]);

        let read = ring.read_since(3);
        assert!(read.samples.is_empty());
        assert_eq!(read.next_cursor, 3);
        assert!(!read.truncated);
    }

    #[test]
    fn test_overwrite_sets_truncated() {
        // Tiny ring: 10 samples.
        let ring = AudioRing::new(10, 1.0);
        ring.write(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        ring.write(&[11, 12, 13]);

        // Cursor 0 fell out of the window (window is now [3, 13)).
        let read = ring.read_since(0);
        assert!(read.truncated);
        assert_eq!(read.samples.len(), 10);
        assert_eq!(read.samples[0], 4);
        assert_eq!(*read.samples.last().unwrap(), 13);
        assert_eq!(read.next_cursor, 13);
    }

    #[test]
    fn test_lagging_cursor_inside_window_is_not_truncated() {
        let ring = AudioRing::new(10, 1.0);
        ring.write(&[1, 2, 3, 4, 5, 6, 7, 8]);
        ring.write(&[9, 10, 11, 12]);

        // Window is [2, 12); cursor 5 is still inside it.
        let read = ring.read_since(5);
        assert!(!read.truncated);
        assert_eq!(read.samples, vec![6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_oversized_write_keeps_tail() {
        let ring = AudioRing::new(4, 1.0);
        let big: Vec<i16> = (1..=10).collect();
        ring.write(&big);

        assert_eq!(ring.write_pos(), 10);
        let read = ring.read_since(0);
        assert!(read.truncated);
        assert_eq!(read.samples, vec![7, 8, 9, 10]);
    }

    #[test]
    fn test_sample_clock_is_monotonic() {
        let ring = AudioRing::new(16000, 1.0);
        assert_eq!(ring.write_pos(), 0);
        ring.write(&[0; 100]);
        assert_eq!(ring.write_pos(), 100);
        ring.write(&[0; 50]);
        assert_eq!(ring.write_pos(), 150);
    }

    #[tokio::test]
    async fn test_wait_for_data_wakes_on_write() {
        let ring = Arc::new(AudioRing::new(16000, 1.0));
        let waiter = ring.clone();

        let task = tokio::spawn(async move { waiter.wait_for_data(0).await });

        // Give the waiter a chance to park before writing.
        tokio::task::yield_now().await;
        ring.write(&[1, 2, 3]);

        assert!(task.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_for_data_returns_false_on_close() {
        let ring = Arc::new(AudioRing::new(16000, 1.0));
        let waiter = ring.clone();

        let task = tokio::spawn(async move { waiter.wait_for_data(0).await });

        tokio::task::yield_now().await;
        ring.close();

        assert!(!task.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_for_data_returns_remaining_before_close() {
        let ring = AudioRing::new(16000, 1.0);
        ring.write(&[1, 2]);
        ring.close();

        // Data before the close is still readable.
        assert!(ring.wait_for_data(0).await);
        assert!(!ring.wait_for_data(2).await);
    }
}
