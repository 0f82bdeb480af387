//! Audio capture plumbing: source seam, ring buffer, VAD, WAV handling.

pub mod ring;
pub mod source;
pub mod vad;
pub mod wav;

pub use ring::{AudioRing, RingRead};
pub use source::{AudioSource, CaptureHandle, spawn_capture};
pub use vad::{Vad, VadConfig};
