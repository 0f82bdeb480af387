//! Transcript aggregation and AI prompt assembly.

pub mod knowledge;
pub mod manager;
pub mod prompts;
pub mod transcript;

pub use knowledge::KnowledgeItem;
pub use manager::{Answer, ContextConfig, ContextManager, Insight, InsightKind, SuggestedQuestions};
pub use transcript::{Transcript, TranscriptSnapshot, Transcription};
