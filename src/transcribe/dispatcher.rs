//! Transcription dispatcher.
//!
//! Consumes utterances in order and produces transcriptions: primary
//! model first, then the fallback chain, with per-model retry and
//! exponential backoff. Commits to the transcript strictly in batch
//! sequence order; with parallelism above one, completions that arrive
//! early wait in a small reorder buffer until their predecessor lands.

use crate::audio::wav::pcm_to_wav;
use crate::batch::queue::{BatchQueue, QueueEntry};
use crate::batch::types::Utterance;
use crate::config::Config;
use crate::context::transcript::{Transcript, Transcription};
use crate::error::ApiError;
use crate::transcribe::client::TranscriptionClient;
use crate::transcribe::stats::ModelStats;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::Instant;

/// Dispatch policy configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub primary_model: String,
    pub fallback_models: Vec<String>,
    pub api_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub parallelism: usize,
    pub sample_rate: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            primary_model: crate::defaults::TRANSCRIPTION_MODEL.to_string(),
            fallback_models: vec![crate::defaults::FALLBACK_MODEL.to_string()],
            api_timeout: Duration::from_secs_f64(crate::defaults::API_TIMEOUT_SECS),
            max_retries: crate::defaults::MAX_RETRIES,
            retry_delay: Duration::from_secs_f64(crate::defaults::RETRY_DELAY_SECS),
            parallelism: 1,
            sample_rate: crate::defaults::SAMPLE_RATE,
        }
    }
}

impl DispatcherConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            primary_model: config.transcription.transcription_model.clone(),
            fallback_models: config.transcription.model_fallback.clone(),
            api_timeout: config.transcription.api_timeout(),
            max_retries: config.transcription.max_retries,
            retry_delay: config.transcription.retry_delay(),
            parallelism: config.transcription.parallelism,
            sample_rate: config.audio.sample_rate,
        }
    }

    fn models(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_model.as_str())
            .chain(self.fallback_models.iter().map(String::as_str))
    }
}

/// The dispatcher stage.
pub struct Dispatcher {
    config: DispatcherConfig,
    client: Arc<dyn TranscriptionClient>,
    stats: Arc<ModelStats>,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        client: Arc<dyn TranscriptionClient>,
        stats: Arc<ModelStats>,
    ) -> Self {
        Self {
            config,
            client,
            stats,
        }
    }

    /// Runs until the queue is closed and drained.
    ///
    /// Every committed transcription is forwarded on `on_commit` for
    /// fan-out; a dropped receiver stops the forwarding but never the
    /// transcript commits.
    pub async fn run(
        self,
        queue: Arc<BatchQueue>,
        transcript: Arc<Transcript>,
        on_commit: mpsc::Sender<Transcription>,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism));
        let (done_tx, done_rx) = mpsc::channel::<Transcription>(self.config.parallelism);

        let next_seq = transcript.last_seq().map(|s| s + 1).unwrap_or(0);
        let committer = tokio::spawn(commit_in_order(
            done_rx,
            transcript,
            on_commit,
            next_seq,
        ));

        while let Some(entry) = queue.pop().await {
            let utterance = match entry {
                QueueEntry::Utterance(utterance) => utterance,
                QueueEntry::Dropped { batch_seq } => {
                    // The audio was shed under backpressure before it could
                    // be transcribed. Commit an errored entry so the
                    // ordered append moves past the gap.
                    if done_tx.send(dropped_transcription(batch_seq)).await.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("dispatcher semaphore closed");
            let config = self.config.clone();
            let client = self.client.clone();
            let stats = self.stats.clone();
            let done_tx = done_tx.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let transcription =
                    transcribe_with_policy(&config, client.as_ref(), &stats, &utterance).await;
                let _ = done_tx.send(transcription).await;
            });
        }

        // Queue closed: let in-flight tasks drain, then the committer ends.
        drop(done_tx);
        let _ = committer.await;
    }
}

/// Commits completions in batch-sequence order, buffering early arrivals.
///
/// Every popped sequence produces exactly one completion, including shed
/// utterances, so the buffer never holds more than the dispatcher's
/// parallelism worth of entries.
async fn commit_in_order(
    mut done_rx: mpsc::Receiver<Transcription>,
    transcript: Arc<Transcript>,
    on_commit: mpsc::Sender<Transcription>,
    mut next_seq: u64,
) {
    let mut reorder: BTreeMap<u64, Transcription> = BTreeMap::new();

    while let Some(transcription) = done_rx.recv().await {
        reorder.insert(transcription.batch_seq, transcription);

        while let Some(transcription) = reorder.remove(&next_seq) {
            match transcript.append(transcription.clone()) {
                Ok(version) => {
                    tracing::debug!(
                        batch_seq = transcription.batch_seq,
                        version,
                        "transcript append"
                    );
                    let _ = on_commit.send(transcription).await;
                }
                Err(e) => tracing::error!("transcript append failed: {e}"),
            }
            next_seq += 1;
        }
    }

    if !reorder.is_empty() {
        tracing::warn!(
            orphaned = reorder.len(),
            "dispatcher shut down with uncommitted completions"
        );
    }
}

/// Runs one utterance through the model chain with retry and backoff.
async fn transcribe_with_policy(
    config: &DispatcherConfig,
    client: &dyn TranscriptionClient,
    stats: &ModelStats,
    utterance: &Utterance,
) -> Transcription {
    let started = Instant::now();
    let wav = match pcm_to_wav(&utterance.samples, config.sample_rate) {
        Ok(wav) => wav,
        Err(e) => {
            return errored(utterance, "encode", started.elapsed(), e.to_string());
        }
    };

    let mut last_error: Option<(String, ApiError)> = None;

    for model in config.models() {
        for attempt in 0..config.max_retries {
            stats.record_attempt(model);
            let attempt_start = Instant::now();

            let result = match tokio::time::timeout(
                config.api_timeout,
                client.transcribe(model, &wav),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ApiError::Timeout),
            };

            match result {
                Ok(remote) => {
                    let latency = attempt_start.elapsed();
                    stats.record_success(model, latency);
                    return Transcription {
                        batch_seq: utterance.batch_seq,
                        text: remote.text,
                        model_used: model.to_string(),
                        latency,
                        confidence: remote.confidence,
                        error: None,
                        ts: chrono::Utc::now(),
                    };
                }
                Err(error) => {
                    stats.record_failure(model);
                    tracing::warn!(
                        batch_seq = utterance.batch_seq,
                        model,
                        attempt,
                        "transcription attempt failed: {error}"
                    );
                    let transient = error.is_transient();
                    let retry_after = error.retry_after();
                    last_error = Some((model.to_string(), error));

                    if !transient {
                        break;
                    }
                    if attempt + 1 < config.max_retries {
                        let delay = retry_after
                            .unwrap_or_else(|| backoff_delay(config.retry_delay, attempt));
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    let (model, error) = last_error
        .map(|(m, e)| (m, e.to_string()))
        .unwrap_or_else(|| ("none".to_string(), "no models configured".to_string()));
    tracing::error!(
        batch_seq = utterance.batch_seq,
        "all transcription models failed: {error}"
    );
    errored(utterance, &model, started.elapsed(), error)
}

fn errored(utterance: &Utterance, model: &str, latency: Duration, error: String) -> Transcription {
    Transcription {
        batch_seq: utterance.batch_seq,
        text: String::new(),
        model_used: model.to_string(),
        latency,
        confidence: None,
        error: Some(error),
        ts: chrono::Utc::now(),
    }
}

/// Placeholder for an utterance shed before any model saw it.
fn dropped_transcription(batch_seq: u64) -> Transcription {
    Transcription {
        batch_seq,
        text: String::new(),
        model_used: "none".to_string(),
        latency: Duration::ZERO,
        confidence: None,
        error: Some("utterance dropped before transcription: queue overflow".to_string()),
        ts: chrono::Utc::now(),
    }
}

/// Exponential backoff with up to 25% jitter.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.mul_f64(2f64.powi(attempt as i32));
    let jitter = rand::thread_rng().gen_range(0.0..0.25);
    exp.mul_f64(1.0 + jitter)
}
