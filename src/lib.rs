//! colloquy - live meeting transcription service
//!
//! Captures a continuous audio stream, segments it into utterances with
//! voice-activity detection, transcribes each through a remote
//! speech-to-text service with a fallback chain, and maintains a growing
//! transcript that an AI layer consumes for live Q&A, periodic insights,
//! and suggested questions. Subscribers follow along over a WebSocket
//! message channel.

pub mod ai;
pub mod audio;
pub mod batch;
pub mod cli;
pub mod config;
pub mod context;
pub mod defaults;
pub mod error;
pub mod server;
pub mod session;
pub mod transcribe;
