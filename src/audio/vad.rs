//! Voice Activity Detection.
//!
//! RMS thresholding over short frames with hysteresis: the stream enters
//! the voiced state above `enter_threshold` and only leaves it after
//! `min_unvoice_frames` consecutive frames below the exit threshold.
//! Everything is frame-counted, so classification is deterministic and
//! independent of wall-clock timing.

use crate::defaults;

/// Configuration for Voice Activity Detection.
#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    /// RMS level (int16 scale) above which a frame is voiced.
    pub enter_threshold: f32,
    /// Exit threshold as a fraction of the enter threshold.
    pub exit_ratio: f32,
    /// Consecutive quiet frames required before leaving the voiced state.
    pub min_unvoice_frames: u32,
    /// Frame length in milliseconds.
    pub frame_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            enter_threshold: defaults::VAD_ENTER_THRESHOLD,
            exit_ratio: defaults::VAD_EXIT_RATIO,
            min_unvoice_frames: defaults::VAD_MIN_UNVOICE_FRAMES,
            frame_ms: defaults::VAD_FRAME_MS,
        }
    }
}

impl VadConfig {
    pub fn exit_threshold(&self) -> f32 {
        self.enter_threshold * self.exit_ratio
    }

    /// Samples per frame at the given rate.
    pub fn frame_samples(&self, sample_rate: u32) -> usize {
        (sample_rate * self.frame_ms / 1000) as usize
    }
}

/// Per-frame voiced/unvoiced classifier with hysteresis.
#[derive(Debug)]
pub struct Vad {
    config: VadConfig,
    voiced: bool,
    quiet_run: u32,
}

impl Vad {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            voiced: false,
            quiet_run: 0,
        }
    }

    /// Classifies one frame. Returns true while the stream is voiced.
    pub fn process(&mut self, frame: &[i16]) -> bool {
        let rms = rms(frame);

        if self.voiced {
            if rms < self.config.exit_threshold() {
                self.quiet_run += 1;
                if self.quiet_run >= self.config.min_unvoice_frames {
                    self.voiced = false;
                    self.quiet_run = 0;
                }
            } else {
                self.quiet_run = 0;
            }
        } else if rms > self.config.enter_threshold {
            self.voiced = true;
            self.quiet_run = 0;
        }

        self.voiced
    }

    pub fn is_voiced(&self) -> bool {
        self.voiced
    }

    pub fn reset(&mut self) {
        self.voiced = false;
        self.quiet_run = 0;
    }

    pub fn config(&self) -> &VadConfig {
        &self.config
    }
}

/// Root mean square of int16 samples, on the int16 scale.
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64;
            v * v
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt() as f32
}
