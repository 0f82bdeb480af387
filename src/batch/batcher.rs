//! VAD-driven utterance batcher.
//!
//! Converts the unbounded capture stream into transcription-ready
//! utterances under three simultaneous policies:
//!
//! - never emit before `min_batch_duration` of content has accumulated,
//! - past the minimum, emit at the first silence run of
//!   `silence_duration_threshold`, ending the utterance at the start of
//!   the run (word boundaries survive; the silence itself does not),
//! - force-emit at exactly `max_batch_duration` if no boundary appears.
//!
//! The last `batch_overlap` seconds of every emitted utterance are carried
//! into the next one so words straddling a boundary are not truncated.
//! A silence run that completes before the minimum is trimmed from the
//! buffer instead of emitted, so long gaps between short phrases never
//! pad an utterance.

use crate::audio::vad::{Vad, VadConfig};
use crate::batch::types::Utterance;
use crate::config::Config;

/// Configuration for the batcher. Durations are converted to sample
/// counts once, up front; everything after that is integer arithmetic.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    pub sample_rate: u32,
    pub min_batch_duration: f64,
    pub max_batch_duration: f64,
    pub silence_duration_threshold: f64,
    pub batch_overlap: f64,
    pub vad: VadConfig,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::defaults::SAMPLE_RATE,
            min_batch_duration: crate::defaults::MIN_BATCH_SECS,
            max_batch_duration: crate::defaults::MAX_BATCH_SECS,
            silence_duration_threshold: crate::defaults::SILENCE_THRESHOLD_SECS,
            batch_overlap: crate::defaults::BATCH_OVERLAP_SECS,
            vad: VadConfig::default(),
        }
    }
}

impl BatcherConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sample_rate: config.audio.sample_rate,
            min_batch_duration: config.batch.min_batch_duration,
            max_batch_duration: config.batch.max_batch_duration,
            silence_duration_threshold: config.batch.silence_duration_threshold,
            batch_overlap: config.batch.batch_overlap,
            vad: VadConfig {
                enter_threshold: config.batch.silence_threshold,
                ..VadConfig::default()
            },
        }
    }

    fn min_samples(&self) -> usize {
        (self.min_batch_duration * self.sample_rate as f64) as usize
    }

    fn max_samples(&self) -> usize {
        (self.max_batch_duration * self.sample_rate as f64) as usize
    }

    fn overlap_samples(&self) -> usize {
        (self.batch_overlap * self.sample_rate as f64) as usize
    }

    fn frame_samples(&self) -> usize {
        self.vad.frame_samples(self.sample_rate)
    }

    /// Unvoiced frames that constitute a silence boundary.
    fn silence_frames(&self) -> u32 {
        let frame_secs = self.vad.frame_ms as f64 / 1000.0;
        (self.silence_duration_threshold / frame_secs).ceil() as u32
    }
}

enum State {
    /// Discarding audio until a voiced frame starts the next utterance.
    WaitingForVoice,
    /// Building an utterance.
    Accumulating,
}

/// The batcher state machine. Fed raw sample slabs in capture order;
/// returns utterances as boundaries are found.
pub struct Batcher {
    config: BatcherConfig,
    vad: Vad,
    state: State,
    /// Current utterance: carried overlap prefix plus accumulated frames.
    buffer: Vec<i16>,
    /// Length of the carried prefix at the front of `buffer`.
    carry_len: usize,
    /// Overlap waiting to prefix the next utterance.
    carry: Vec<i16>,
    /// Capture-clock position of `buffer[0]`.
    utterance_start: u64,
    /// Buffer length when the current silence run began.
    silence_start_len: Option<usize>,
    /// Unvoiced frames in the current run.
    silence_frames: u32,
    /// Samples not yet forming a whole VAD frame.
    pending: Vec<i16>,
    /// Capture-clock position of the next sample to be fed.
    clock: u64,
    next_seq: u64,
}

impl Batcher {
    pub fn new(config: BatcherConfig) -> Self {
        let vad = Vad::new(config.vad);
        Self {
            config,
            vad,
            state: State::WaitingForVoice,
            buffer: Vec::new(),
            carry_len: 0,
            carry: Vec::new(),
            utterance_start: 0,
            silence_start_len: None,
            silence_frames: 0,
            pending: Vec::new(),
            clock: 0,
            next_seq: 0,
        }
    }

    /// Next batch sequence number to be assigned.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Feeds a slab of capture samples; returns any completed utterances.
    pub fn feed(&mut self, samples: &[i16]) -> Vec<Utterance> {
        let frame_len = self.config.frame_samples();
        let mut emitted = Vec::new();

        self.pending.extend_from_slice(samples);
        while self.pending.len() >= frame_len {
            let frame: Vec<i16> = self.pending.drain(..frame_len).collect();
            let frame_start = self.clock;
            self.clock += frame_len as u64;
            self.process_frame(&frame, frame_start, &mut emitted);
        }

        emitted
    }

    /// Drops all in-progress state (pause, ring truncation) and waits for
    /// the next voiced frame. Sequence numbering continues.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.carry.clear();
        self.carry_len = 0;
        self.pending.clear();
        self.silence_start_len = None;
        self.silence_frames = 0;
        self.vad.reset();
        self.state = State::WaitingForVoice;
    }

    /// Resets and moves the capture clock, after a ring truncation.
    pub fn reset_at(&mut self, position: u64) {
        self.reset();
        self.clock = position;
    }

    fn process_frame(&mut self, frame: &[i16], frame_start: u64, emitted: &mut Vec<Utterance>) {
        let voiced = self.vad.process(frame);

        match self.state {
            State::WaitingForVoice => {
                if !voiced {
                    return;
                }
                self.buffer.clear();
                self.carry_len = self.carry.len();
                self.buffer.append(&mut self.carry);
                self.utterance_start = frame_start.saturating_sub(self.carry_len as u64);
                self.buffer.extend_from_slice(frame);
                self.silence_start_len = None;
                self.silence_frames = 0;
                self.state = State::Accumulating;
            }
            State::Accumulating => {
                if voiced {
                    if self.silence_start_len.take().is_some() {
                        // Short pause, kept in the utterance.
                        self.silence_frames = 0;
                    }
                    self.buffer.extend_from_slice(frame);
                    if let Some(utterance) = self.maybe_force_emit() {
                        emitted.push(utterance);
                    }
                } else {
                    if self.silence_start_len.is_none() {
                        self.silence_start_len = Some(self.buffer.len());
                    }
                    self.silence_frames += 1;
                    self.buffer.extend_from_slice(frame);

                    if self.silence_frames >= self.config.silence_frames() {
                        let content_end = self.silence_start_len.unwrap_or(self.buffer.len());
                        let new_content = content_end.saturating_sub(self.carry_len);
                        if new_content >= self.config.min_samples() {
                            emitted.push(self.emit_at(content_end));
                        } else {
                            // Below the minimum: discard the silence and
                            // keep accumulating from where speech left off.
                            self.buffer.truncate(content_end);
                            self.silence_start_len = None;
                            self.silence_frames = 0;
                        }
                    } else if let Some(utterance) = self.maybe_force_emit() {
                        emitted.push(utterance);
                    }
                }
            }
        }
    }

    /// Emits `buffer[..content_end]` at a silence boundary, keeping the
    /// overlap tail for the next utterance.
    fn emit_at(&mut self, content_end: usize) -> Utterance {
        let overlap = self.config.overlap_samples().min(content_end);
        self.carry = self.buffer[content_end - overlap..content_end].to_vec();

        let mut samples = std::mem::take(&mut self.buffer);
        samples.truncate(content_end);

        let utterance = Utterance {
            batch_seq: self.bump_seq(),
            start_sample: self.utterance_start,
            end_sample: self.utterance_start + content_end as u64,
            samples,
        };

        self.carry_len = 0;
        self.silence_start_len = None;
        self.silence_frames = 0;
        self.state = State::WaitingForVoice;

        utterance
    }

    /// Force-emits exactly `max_batch_duration` once the buffer reaches it,
    /// rolling the overlap and any excess into the next utterance.
    fn maybe_force_emit(&mut self) -> Option<Utterance> {
        let max = self.config.max_samples();
        if self.buffer.len() < max {
            return None;
        }

        let leftover = self.buffer.split_off(max);
        let samples = std::mem::take(&mut self.buffer);

        let overlap = self.config.overlap_samples().min(samples.len());
        self.buffer
            .extend_from_slice(&samples[samples.len() - overlap..]);
        self.buffer.extend_from_slice(&leftover);

        let utterance = Utterance {
            batch_seq: self.bump_seq(),
            start_sample: self.utterance_start,
            end_sample: self.utterance_start + max as u64,
            samples,
        };

        self.carry_len = overlap;
        self.utterance_start = utterance.end_sample - overlap as u64;
        // Rebase silence bookkeeping onto the new buffer.
        self.silence_start_len = match self.silence_start_len {
            Some(len) if len >= max => Some(len - max + overlap),
            _ => {
                self.silence_frames = 0;
                None
            }
        };

        Some(utterance)
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}
