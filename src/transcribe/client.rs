//! Transcription service seam.
//!
//! The dispatcher talks to any backend through this trait; tests script
//! one with per-model responses, failures, and latencies.

use crate::error::ApiError;
use async_trait::async_trait;

/// A transcription returned by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTranscription {
    pub text: String,
    pub confidence: Option<f32>,
}

impl RemoteTranscription {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }
}

/// Speech-to-text backend.
///
/// `wav` is a complete 16-bit PCM little-endian mono WAV file at the
/// session sample rate.
#[async_trait]
pub trait TranscriptionClient: Send + Sync {
    async fn transcribe(&self, model: &str, wav: &[u8]) -> Result<RemoteTranscription, ApiError>;
}

/// Scripted transcription client for tests.
#[derive(Default)]
pub struct MockTranscriptionClient {
    responses: std::sync::Mutex<
        std::collections::HashMap<
            String,
            std::collections::VecDeque<Result<RemoteTranscription, ApiError>>,
        >,
    >,
    default_response: Option<Result<RemoteTranscription, ApiError>>,
    latency: std::sync::Mutex<std::collections::HashMap<String, std::time::Duration>>,
    calls: std::sync::Mutex<Vec<String>>,
}

impl MockTranscriptionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for a model.
    pub fn with_response(self, model: &str, text: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(Ok(RemoteTranscription::from_text(text)));
        self
    }

    /// Queue a failure for a model.
    pub fn with_failure(self, model: &str, error: ApiError) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(Err(error));
        self
    }

    /// Every call to `model` fails with `error` once its queue is empty.
    pub fn with_default_failure(mut self, error: ApiError) -> Self {
        self.default_response = Some(Err(error));
        self
    }

    /// Every call succeeds with `text` once the model's queue is empty.
    pub fn with_default_response(mut self, text: &str) -> Self {
        self.default_response = Some(Ok(RemoteTranscription::from_text(text)));
        self
    }

    /// Adds an artificial delay to every call for a model.
    pub fn with_latency(self, model: &str, latency: std::time::Duration) -> Self {
        self.latency
            .lock()
            .unwrap()
            .insert(model.to_string(), latency);
        self
    }

    /// Models called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, model: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|m| *m == model).count()
    }
}

#[async_trait]
impl TranscriptionClient for MockTranscriptionClient {
    async fn transcribe(&self, model: &str, _wav: &[u8]) -> Result<RemoteTranscription, ApiError> {
        self.calls.lock().unwrap().push(model.to_string());

        let latency = self.latency.lock().unwrap().get(model).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self
            .responses
            .lock()
            .unwrap()
            .get_mut(model)
            .and_then(|queue| queue.pop_front());

        match scripted {
            Some(response) => response,
            None => self.default_response.clone().unwrap_or_else(|| {
                Err(ApiError::Client {
                    status: 404,
                    message: format!("no scripted response for model {model}"),
                })
            }),
        }
    }
}
