//! Generative AI service seam.

use crate::error::ApiError;
use async_trait::async_trait;

/// One generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Text generation backend for insights, suggested questions, and Q&A.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, ApiError>;
}

/// Scripted generative client for tests.
#[derive(Default)]
pub struct MockGenerativeClient {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String, ApiError>>>,
    default_response: Option<String>,
    latency: Option<std::time::Duration>,
    prompts: std::sync::Mutex<Vec<String>>,
}

impl MockGenerativeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, text: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(text.to_string()));
        self
    }

    pub fn with_failure(self, error: ApiError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Returned once the scripted queue is drained.
    pub fn with_default_response(mut self, text: &str) -> Self {
        self.default_response = Some(text.to_string());
        self
    }

    pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerativeClient for MockGenerativeClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, ApiError> {
        self.prompts.lock().unwrap().push(request.prompt);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self.responses.lock().unwrap().pop_front();
        match scripted {
            Some(response) => response,
            None => match &self.default_response {
                Some(text) => Ok(text.clone()),
                None => Err(ApiError::Server {
                    status: 500,
                    message: "no scripted response".to_string(),
                }),
            },
        }
    }
}
