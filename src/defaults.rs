//! Default configuration constants for colloquy.
//!
//! Shared between the config types and the component defaults so the two
//! never drift apart.

/// Audio sample rate in Hz.
///
/// 16kHz mono is the standard input format for speech-to-text APIs and is
/// what the capture sources deliver.
pub const SAMPLE_RATE: u32 = 16000;

/// Source chunk size in samples (64ms at 16kHz).
pub const CHUNK_SIZE: usize = 1024;

/// Ring buffer capacity in seconds.
pub const BUFFER_DURATION_SECS: f64 = 10.0;

/// VAD frame length in milliseconds.
pub const VAD_FRAME_MS: u32 = 20;

/// RMS threshold (int16 scale) above which a frame is considered voiced.
pub const VAD_ENTER_THRESHOLD: f32 = 500.0;

/// Fraction of the enter threshold below which a voiced stream exits to
/// unvoiced. Exit below enter gives the detector hysteresis.
pub const VAD_EXIT_RATIO: f32 = 0.6;

/// Consecutive quiet frames required before a voiced stream flips to
/// unvoiced.
pub const VAD_MIN_UNVOICE_FRAMES: u32 = 2;

/// Minimum utterance duration in seconds before the batcher may emit.
pub const MIN_BATCH_SECS: f64 = 3.0;

/// Maximum utterance duration in seconds before the batcher force-emits.
pub const MAX_BATCH_SECS: f64 = 30.0;

/// Continuous silence in seconds that closes an utterance.
pub const SILENCE_THRESHOLD_SECS: f64 = 0.5;

/// Audio carried from the end of one utterance into the next, in seconds.
/// Prevents word truncation at batch boundaries.
pub const BATCH_OVERLAP_SECS: f64 = 0.5;

/// Capacity of the utterance queue between batcher and dispatcher.
pub const BATCH_QUEUE_CAPACITY: usize = 100;

/// Default primary transcription model.
pub const TRANSCRIPTION_MODEL: &str = "gpt-4o-transcribe";

/// Default fallback transcription model.
pub const FALLBACK_MODEL: &str = "whisper-1";

/// Timeout for a single outbound API call, in seconds.
pub const API_TIMEOUT_SECS: f64 = 30.0;

/// Retry attempts per transcription model.
pub const MAX_RETRIES: u32 = 3;

/// Base delay for exponential retry backoff, in seconds.
pub const RETRY_DELAY_SECS: f64 = 1.0;

/// Default generative model for insights and Q&A.
pub const GENERATIVE_MODEL: &str = "gemini-2.0-flash-lite";

/// Sampling temperature for generative calls.
pub const GENERATIVE_TEMPERATURE: f32 = 0.3;

/// Output token cap for generative calls.
pub const GENERATIVE_MAX_TOKENS: u32 = 800;

/// Seconds between automated insight generations.
pub const INSIGHT_INTERVAL_SECS: f64 = 60.0;

/// Seconds between suggested-question rotations.
pub const QUESTION_UPDATE_INTERVAL_SECS: f64 = 15.0;

/// Number of rotating suggested-question slots.
pub const NUM_DYNAMIC_QUESTIONS: usize = 4;

/// Byte budget for knowledge items included in AI prompts.
pub const KNOWLEDGE_BUDGET_BYTES: usize = 16 * 1024;

/// Q&A exchanges kept as conversation history for follow-up questions.
pub const MAX_CONVERSATION_LENGTH: usize = 20;

/// Subscriber endpoint bind address.
pub const SERVER_HOST: &str = "localhost";

/// Subscriber endpoint port.
pub const SERVER_PORT: u16 = 8765;

/// Messages buffered per subscriber before the overflow policy kicks in.
pub const SUBSCRIBER_BUFFER: usize = 64;
