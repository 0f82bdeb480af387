//! HTTP client for Gemini-style `generateContent` endpoints.

use crate::ai::client::{GenerationRequest, GenerativeClient};
use crate::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// Client for a remote generative API.
pub struct HttpGenerativeClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

impl HttpGenerativeClient {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
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
impl GenerativeClient for HttpGenerativeClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, ApiError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": request.prompt }] }],
            "generationConfig": GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        });

        let response = self
            .http
            .post(format!(
                "{}/models/{}:generateContent",
                self.api_base, self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
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

        let body: GenerateResponse = response.json().await.map_err(|e| ApiError::Network {
            message: format!("malformed generation response: {e}"),
        })?;

        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.trim().to_string())
            .ok_or_else(|| ApiError::Server {
                status: 200,
                message: "empty generation response".to_string(),
            })?;

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "candidates": [
                { "content": { "parts": [{ "text": " an answer " }] } }
            ]
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.candidates[0].content.parts[0].text, " an answer ");
    }

    #[test]
    fn test_empty_candidates_parse() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(parsed.candidates.is_empty());
    }

    #[test]
    fn test_api_base_trailing_slash_is_trimmed() {
        let client = HttpGenerativeClient::new("https://ai.example.com/v1/", "key", "model-1");
        assert_eq!(client.api_base, "https://ai.example.com/v1");
    }
}
