//! Audio source seam and the capture thread that feeds the ring.
//!
//! Platform capture drivers live outside the core; anything that can
//! deliver blocking chunks of 16-bit mono PCM plugs in here.

use crate::audio::ring::AudioRing;
use crate::error::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Blocking source of 16-bit mono PCM audio.
///
/// `read_chunk` blocks until the next chunk is available and returns an
/// empty vector at end of stream.
pub trait AudioSource: Send {
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn read_chunk(&mut self) -> Result<Vec<i16>>;
}

/// Handle to a running capture thread.
pub struct CaptureHandle {
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    /// Signals the capture thread to stop after its current read.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Returns true while the capture thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Waits for the capture thread to exit.
    pub fn join(mut self) {
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

/// Starts a capture thread that writes source chunks into the ring.
///
/// The thread exits when the source reports end-of-stream, on a read
/// error, or after `stop()`. In every case the ring is closed so readers
/// wake up and observe the end of the stream.
pub fn spawn_capture(mut source: Box<dyn AudioSource>, ring: Arc<AudioRing>) -> Result<CaptureHandle> {
    source.start()?;

    let running = Arc::new(AtomicBool::new(true));
    let thread_running = running.clone();

    let join = thread::spawn(move || {
        while thread_running.load(Ordering::SeqCst) {
            match source.read_chunk() {
                Ok(chunk) if !chunk.is_empty() => {
                    ring.write(&chunk);
                }
                Ok(_) => {
                    tracing::debug!("audio source exhausted, stopping capture");
                    break;
                }
                Err(e) => {
                    tracing::error!("audio capture error: {e}");
                    break;
                }
            }
        }
        thread_running.store(false, Ordering::SeqCst);
        let _ = source.stop();
        ring.close();
    });

    Ok(CaptureHandle {
        running,
        join: Some(join),
    })
}

/// Scripted audio source for tests.
#[derive(Debug, Default)]
pub struct MockAudioSource {
    chunks: std::collections::VecDeque<Vec<i16>>,
    start_fails: bool,
    read_fails: bool,
    started: bool,
}

impl MockAudioSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a chunk to be returned by `read_chunk`.
    pub fn with_chunk(mut self, samples: Vec<i16>) -> Self {
        self.chunks.push_back(samples);
        self
    }

    /// Queue the same chunk several times.
    pub fn with_repeated_chunk(mut self, samples: Vec<i16>, count: usize) -> Self {
        for _ in 0..count {
            self.chunks.push_back(samples.clone());
        }
        self
    }

    pub fn with_start_failure(mut self) -> Self {
        self.start_fails = true;
        self
    }

    pub fn with_read_failure(mut self) -> Self {
        self.read_fails = true;
        self
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.start_fails {
            return Err(crate::error::ColloquyError::AudioSource {
                message: "mock start failure".to_string(),
            });
        }
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    fn read_chunk(&mut self) -> Result<Vec<i16>> {
        if self.read_fails {
            return Err(crate::error::ColloquyError::AudioSource {
                message: "mock read failure".to_string(),
            });
        }
        Ok(self.chunks.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_mock_source_returns_queued_chunks() {
        let mut source = MockAudioSource::new()
            .with_chunk(vec![1, 2, 3])
            .with_chunk(vec![4, 5]);

        source.start().unwrap();
        assert_eq!(source.read_chunk().unwrap(), vec![1, 2, 3]);
        assert_eq!(source.read_chunk().unwrap(), vec![4, 5]);
        assert!(source.read_chunk().unwrap().is_empty());
    }

    #[test]
    fn test_spawn_capture_start_failure() {
        let ring = Arc::new(AudioRing::new(16000, 1.0));
        let source = Box::new(MockAudioSource::new().with_start_failure());
        assert!(spawn_capture(source, ring).is_err());
    }

    #[test]
    fn test_capture_writes_chunks_to_ring() {
        let ring = Arc::new(AudioRing::new(16000, 1.0));
        let source = Box::new(
            MockAudioSource::new()
                .with_chunk(vec![100i16; 160])
                .with_chunk(vec![200i16; 160]),
        );

        let handle = spawn_capture(source, ring.clone()).unwrap();
        handle.join();

        let read = ring.read_since(0);
        assert_eq!(read.samples.len(), 320);
        assert_eq!(read.samples[0], 100);
        assert_eq!(read.samples[160], 200);
        assert!(ring.is_closed());
    }

    #[test]
    fn test_capture_closes_ring_on_read_failure() {
        let ring = Arc::new(AudioRing::new(16000, 1.0));
        let source = Box::new(MockAudioSource::new().with_read_failure());

        let handle = spawn_capture(source, ring.clone()).unwrap();
        handle.join();

        assert!(ring.is_closed());
        assert_eq!(ring.write_pos(), 0);
    }

    #[test]
    fn test_capture_stop() {
        struct BlockingSource;
        impl AudioSource for BlockingSource {
            fn start(&mut self) -> Result<()> {
                Ok(())
            }
            fn stop(&mut self) -> Result<()> {
                Ok(())
            }
            fn read_chunk(&mut self) -> Result<Vec<i16>> {
                std::thread::sleep(Duration::from_millis(5));
                Ok(vec![0i16; 16])
            }
        }

        let ring = Arc::new(AudioRing::new(16000, 1.0));
        let handle = spawn_capture(Box::new(BlockingSource), ring.clone()).unwrap();
        assert!(handle.is_running());

        handle.stop();
        handle.join();
        assert!(ring.is_closed());
    }
}
