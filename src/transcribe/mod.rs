//! Remote transcription: client seam, dispatch policy, statistics.

pub mod client;
pub mod dispatcher;
pub mod remote;
pub mod stats;

pub use client::{RemoteTranscription, TranscriptionClient};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use stats::ModelStats;
