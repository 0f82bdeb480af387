//! JSON message protocol between subscribers and the session hub.
//!
//! A closed sum over the `type` field in both directions; unknown types
//! fail to parse and earn the sender an `error` message.

use crate::context::manager::InsightKind;
use crate::context::knowledge::KnowledgeItem;
use crate::session::state::RecordingState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Messages sent by subscribers to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Begin recording.
    Start,
    /// Pause recording; the transcript is retained.
    Stop,
    /// Set the session focus string that biases AI prompts.
    SetFocus { focus: String },
    /// Replace the session knowledge items.
    SetKnowledge { items: Vec<KnowledgeItem> },
    /// Ask a question over the transcript.
    Question {
        question: String,
        request_id: String,
    },
    /// Liveness probe.
    Ping,
}

impl ClientMessage {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Messages sent by the hub to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A committed transcription. Empty text with `error` set marks a
    /// continuity gap where every model failed.
    Transcription {
        text: String,
        batch_seq: u64,
        ts: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        error: bool,
    },
    /// Answer to a `question`, correlated by request id.
    Answer {
        request_id: String,
        answer: String,
        latency_ms: u64,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        error: bool,
    },
    /// An automated insight.
    Insight {
        kind: InsightKind,
        text: String,
        ts: DateTime<Utc>,
    },
    /// The current suggested-question list.
    SuggestedQuestions {
        questions: Vec<String>,
        rotated_index: usize,
    },
    /// Session state, broadcast on every change.
    State {
        recording: RecordingState,
        focus: String,
    },
    /// Acknowledges a `set_knowledge`.
    KnowledgeAck { count: usize },
    /// A non-fatal failure.
    Error { kind: String, message: String },
    /// Liveness reply.
    Pong,
}

impl ServerMessage {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Transcriptions get preferential treatment in subscriber buffers.
    pub fn is_transcription(&self) -> bool {
        matches!(self, ServerMessage::Transcription { .. })
    }
}
