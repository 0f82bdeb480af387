//! Utterance batching: VAD-driven segmentation of the capture stream.

pub mod batcher;
pub mod queue;
pub mod types;

pub use batcher::{Batcher, BatcherConfig};
pub use queue::{BatchQueue, QueueEntry};
pub use types::Utterance;
