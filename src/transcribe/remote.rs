//! HTTP transcription client for OpenAI-style `audio/transcriptions`
//! endpoints.
//!
//! Ships each utterance as a multipart WAV upload and classifies failures
//! into the retry taxonomy the dispatcher acts on.

use crate::error::ApiError;
use crate::transcribe::client::{RemoteTranscription, TranscriptionClient};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Client for a remote transcription API.
pub struct HttpTranscriptionClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl HttpTranscriptionClient {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn classify(error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network {
                message: error.to_string(),
            }
        }
    }

    fn retry_after(response: &reqwest::Response) -> Option<Duration> {
        response
            .headers()
            .get(reqwest::header::RETRY_AFTER)?
            .to_str()
            .ok()?
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    }
}

#[async_trait]
impl TranscriptionClient for HttpTranscriptionClient {
    async fn transcribe(&self, model: &str, wav: &[u8]) -> Result<RemoteTranscription, ApiError> {
        let part = reqwest::multipart::Part::bytes(wav.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| ApiError::Network {
                message: e.to_string(),
            })?;
        let form = reqwest::multipart::Form::new()
            .text("model", model.to_string())
            .text("response_format", "json")
            .part("file", part);

        let response = self
            .http
            .post(format!("{}/audio/transcriptions", self.api_base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ApiError::RateLimited {
                retry_after: Self::retry_after(&response),
            });
        }
        if status.is_server_error() {
            return Err(ApiError::Server {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        if !status.is_success() {
            return Err(ApiError::Client {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: TranscriptionResponse =
            response.json().await.map_err(|e| ApiError::Network {
                message: format!("malformed transcription response: {e}"),
            })?;

        Ok(RemoteTranscription {
            text: body.text.trim().to_string(),
            confidence: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_trailing_slash_is_trimmed() {
        let client = HttpTranscriptionClient::new("https://api.example.com/v1/", "key");
        assert_eq!(client.api_base, "https://api.example.com/v1");
    }

    #[test]
    fn test_response_parsing() {
        let body: TranscriptionResponse =
            serde_json::from_str(r#"{"text":"  hello world "}"#).unwrap();
        assert_eq!(body.text, "  hello world ");
    }
}
