//! Configuration for the colloquy service.
//!
//! Layered the usual way: defaults, then a TOML file, then `COLLOQUY_*`
//! environment variable overrides.

use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub batch: BatchConfig,
    pub transcription: TranscriptionConfig,
    pub ai: AiConfig,
    pub server: ServerConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Source chunk size in samples.
    pub chunk_size: usize,
    /// Ring buffer capacity in seconds.
    pub buffer_duration: f64,
}

/// Batcher configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    /// Minimum utterance duration in seconds.
    pub min_batch_duration: f64,
    /// Maximum utterance duration in seconds.
    pub max_batch_duration: f64,
    /// Continuous silence in seconds that closes an utterance.
    pub silence_duration_threshold: f64,
    /// Seconds of audio carried between consecutive utterances.
    pub batch_overlap: f64,
    /// VAD enter threshold (RMS, int16 scale).
    pub silence_threshold: f32,
    /// Utterance queue capacity.
    pub queue_capacity: usize,
    /// Optional bound in seconds on how long the batcher waits for queue
    /// space before evicting the oldest queued utterance.
    pub enqueue_timeout: Option<f64>,
}

/// Transcription service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Primary model id.
    pub transcription_model: String,
    /// Ordered fallback model ids.
    pub model_fallback: Vec<String>,
    /// Per-request timeout in seconds.
    pub api_timeout: f64,
    /// Retry attempts per model.
    pub max_retries: u32,
    /// Base backoff delay in seconds.
    pub retry_delay: f64,
    /// Concurrent in-flight transcriptions.
    pub parallelism: usize,
    /// Base URL of the transcription API.
    pub api_base: String,
}

/// Generative AI configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    /// Generative model id.
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Seconds between automated insight generations.
    pub insight_interval: f64,
    /// Seconds between suggested-question rotations.
    pub question_update_interval: f64,
    /// Number of rotating suggested-question slots.
    pub num_dynamic_questions: usize,
    /// Byte budget for knowledge items in prompts.
    pub knowledge_budget_bytes: usize,
    /// Q&A exchanges retained for follow-up context.
    pub max_conversation_length: usize,
    /// Base URL of the generative API.
    pub api_base: String,
}

/// Subscriber endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub server_host: String,
    pub server_port: u16,
    /// Messages buffered per subscriber before overflow handling.
    pub subscriber_buffer: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            chunk_size: defaults::CHUNK_SIZE,
            buffer_duration: defaults::BUFFER_DURATION_SECS,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            min_batch_duration: defaults::MIN_BATCH_SECS,
            max_batch_duration: defaults::MAX_BATCH_SECS,
            silence_duration_threshold: defaults::SILENCE_THRESHOLD_SECS,
            batch_overlap: defaults::BATCH_OVERLAP_SECS,
            silence_threshold: defaults::VAD_ENTER_THRESHOLD,
            queue_capacity: defaults::BATCH_QUEUE_CAPACITY,
            enqueue_timeout: None,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            transcription_model: defaults::TRANSCRIPTION_MODEL.to_string(),
            model_fallback: vec![defaults::FALLBACK_MODEL.to_string()],
            api_timeout: defaults::API_TIMEOUT_SECS,
            max_retries: defaults::MAX_RETRIES,
            retry_delay: defaults::RETRY_DELAY_SECS,
            parallelism: 1,
            api_base: "https://api.openai.com/v1".to_string(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: defaults::GENERATIVE_MODEL.to_string(),
            temperature: defaults::GENERATIVE_TEMPERATURE,
            max_tokens: defaults::GENERATIVE_MAX_TOKENS,
            insight_interval: defaults::INSIGHT_INTERVAL_SECS,
            question_update_interval: defaults::QUESTION_UPDATE_INTERVAL_SECS,
            num_dynamic_questions: defaults::NUM_DYNAMIC_QUESTIONS,
            knowledge_budget_bytes: defaults::KNOWLEDGE_BUDGET_BYTES,
            max_conversation_length: defaults::MAX_CONVERSATION_LENGTH,
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_host: defaults::SERVER_HOST.to_string(),
            server_port: defaults::SERVER_PORT,
            subscriber_buffer: defaults::SUBSCRIBER_BUFFER,
        }
    }
}

impl BatchConfig {
    pub fn enqueue_timeout(&self) -> Option<Duration> {
        self.enqueue_timeout.map(Duration::from_secs_f64)
    }
}

impl TranscriptionConfig {
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.api_timeout)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay)
    }
}

impl AiConfig {
    pub fn insight_interval(&self) -> Duration {
        Duration::from_secs_f64(self.insight_interval)
    }

    pub fn question_update_interval(&self) -> Duration {
        Duration::from_secs_f64(self.question_update_interval)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values; invalid TOML is an error.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, or defaults if the file is missing.
    pub fn load_or_default(path: &Path) -> crate::error::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - COLLOQUY_TRANSCRIPTION_MODEL → transcription.transcription_model
    /// - COLLOQUY_AI_MODEL → ai.model
    /// - COLLOQUY_HOST → server.server_host
    /// - COLLOQUY_PORT → server.server_port
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("COLLOQUY_TRANSCRIPTION_MODEL")
            && !model.is_empty()
        {
            self.transcription.transcription_model = model;
        }

        if let Ok(model) = std::env::var("COLLOQUY_AI_MODEL")
            && !model.is_empty()
        {
            self.ai.model = model;
        }

        if let Ok(host) = std::env::var("COLLOQUY_HOST")
            && !host.is_empty()
        {
            self.server.server_host = host;
        }

        if let Ok(port) = std::env::var("COLLOQUY_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.server_port = port;
        }

        self
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::ColloquyError;

        if self.audio.sample_rate == 0 {
            return Err(ColloquyError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.batch.min_batch_duration <= 0.0 {
            return Err(ColloquyError::ConfigInvalidValue {
                key: "batch.min_batch_duration".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.batch.max_batch_duration <= self.batch.min_batch_duration {
            return Err(ColloquyError::ConfigInvalidValue {
                key: "batch.max_batch_duration".to_string(),
                message: "must be greater than min_batch_duration".to_string(),
            });
        }
        if self.batch.silence_duration_threshold <= 0.0 {
            return Err(ColloquyError::ConfigInvalidValue {
                key: "batch.silence_duration_threshold".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.transcription.parallelism == 0 {
            return Err(ColloquyError::ConfigInvalidValue {
                key: "transcription.parallelism".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.ai.num_dynamic_questions == 0 {
            return Err(ColloquyError::ConfigInvalidValue {
                key: "ai.num_dynamic_questions".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/colloquy/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .expect("Could not determine config directory")
            .join("colloquy")
            .join("config.toml")
    }
}
