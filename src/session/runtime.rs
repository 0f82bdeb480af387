//! Session wiring: capture → ring → batcher → queue → dispatcher →
//! transcript/hub, plus the periodic AI tasks.
//!
//! Stages are long-lived tasks joined by bounded queues. Stop propagates
//! through the recording-state watch channel: every stage observes it at
//! its next loop iteration or suspension point, the batcher closes the
//! utterance queue, the dispatcher drains and exits, and the hub closes
//! every subscriber after broadcasting the terminal state.

use crate::ai::client::GenerativeClient;
use crate::audio::ring::AudioRing;
use crate::audio::source::{AudioSource, CaptureHandle, spawn_capture};
use crate::batch::batcher::{Batcher, BatcherConfig};
use crate::batch::queue::BatchQueue;
use crate::config::Config;
use crate::context::manager::{ContextConfig, ContextManager};
use crate::context::transcript::Transcript;
use crate::error::Result;
use crate::session::hub::{Hub, HubHandle};
use crate::session::state::RecordingState;
use crate::session::tickers;
use crate::transcribe::client::TranscriptionClient;
use crate::transcribe::dispatcher::{Dispatcher, DispatcherConfig};
use crate::transcribe::stats::ModelStats;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Everything the runtime needs, derived from the application config.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub batcher: BatcherConfig,
    pub dispatcher: DispatcherConfig,
    pub context: ContextConfig,
    pub ring_capacity_secs: f64,
    pub queue_capacity: usize,
    pub enqueue_timeout: Option<Duration>,
    pub subscriber_buffer: usize,
    pub insight_interval: Duration,
    pub question_update_interval: Duration,
}

impl SessionConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batcher: BatcherConfig::from_config(config),
            dispatcher: DispatcherConfig::from_config(config),
            context: ContextConfig::from_config(config),
            ring_capacity_secs: config.audio.buffer_duration,
            queue_capacity: config.batch.queue_capacity,
            enqueue_timeout: config.batch.enqueue_timeout(),
            subscriber_buffer: config.server.subscriber_buffer,
            insight_interval: config.ai.insight_interval(),
            question_update_interval: config.ai.question_update_interval(),
        }
    }
}

/// A running session.
pub struct Session {
    hub: HubHandle,
    transcript: Arc<Transcript>,
    stats: Arc<ModelStats>,
    state: watch::Receiver<RecordingState>,
    capture: Option<CaptureHandle>,
    ring: Arc<AudioRing>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Builds and starts every stage of the pipeline. The session comes
    /// up `Paused`; a `start` command begins recording.
    pub fn start(
        config: SessionConfig,
        source: Box<dyn AudioSource>,
        transcription: Arc<dyn TranscriptionClient>,
        generative: Arc<dyn GenerativeClient>,
    ) -> Result<Self> {
        let transcript = Arc::new(Transcript::new());
        let stats = Arc::new(ModelStats::new());
        let context = Arc::new(ContextManager::new(
            config.context.clone(),
            generative,
            transcript.clone(),
        ));

        let (state_tx, state_rx) = watch::channel(RecordingState::Paused);
        let (hub, handle) = Hub::new(context.clone(), state_tx.clone(), config.subscriber_buffer);

        let sample_rate = config.batcher.sample_rate;
        let ring = Arc::new(AudioRing::new(sample_rate, config.ring_capacity_secs));
        let capture = spawn_capture(source, ring.clone())?;
        let queue = Arc::new(BatchQueue::new(config.queue_capacity));

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(hub.run()));

        tasks.push(tokio::spawn(run_batcher(
            ring.clone(),
            queue.clone(),
            config.batcher.clone(),
            config.enqueue_timeout,
            state_tx.subscribe(),
            handle.clone(),
        )));

        let (commit_tx, mut commit_rx) = mpsc::channel(64);
        let dispatcher = Dispatcher::new(config.dispatcher.clone(), transcription, stats.clone());
        tasks.push(tokio::spawn(dispatcher.run(
            queue.clone(),
            transcript.clone(),
            commit_tx,
        )));

        // Bridge committed transcriptions into hub fan-out.
        let commit_hub = handle.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(transcription) = commit_rx.recv().await {
                commit_hub.publish_transcription(transcription).await;
            }
        }));

        tasks.push(tokio::spawn(tickers::run_insight_ticker(
            config.insight_interval,
            context.clone(),
            handle.clone(),
            state_tx.subscribe(),
        )));
        tasks.push(tokio::spawn(tickers::run_question_ticker(
            config.question_update_interval,
            context.clone(),
            handle.clone(),
            state_tx.subscribe(),
        )));

        Ok(Self {
            hub: handle,
            transcript,
            stats,
            state: state_rx,
            capture: Some(capture),
            ring,
            tasks,
        })
    }

    pub fn hub(&self) -> HubHandle {
        self.hub.clone()
    }

    pub fn transcript(&self) -> Arc<Transcript> {
        self.transcript.clone()
    }

    pub fn stats(&self) -> Arc<ModelStats> {
        self.stats.clone()
    }

    pub fn recording_state(&self) -> RecordingState {
        *self.state.borrow()
    }

    /// Terminal shutdown: stops capture, tears down every stage, and
    /// waits for the tasks to finish.
    pub async fn shutdown(mut self) {
        if let Some(capture) = self.capture.take() {
            capture.stop();
        }
        self.ring.close();
        self.hub.shutdown().await;

        for task in self.tasks.drain(..) {
            if tokio::time::timeout(Duration::from_secs(5), task)
                .await
                .is_err()
            {
                tracing::warn!("session task did not stop within grace period");
            }
        }
    }
}

/// The batching stage: follows the ring cursor, discards audio while the
/// session is paused, and resynchronizes after ring truncation.
async fn run_batcher(
    ring: Arc<AudioRing>,
    queue: Arc<BatchQueue>,
    config: BatcherConfig,
    enqueue_timeout: Option<Duration>,
    mut state: watch::Receiver<RecordingState>,
    hub: HubHandle,
) {
    let mut batcher = Batcher::new(config);
    let mut cursor = 0u64;

    loop {
        let current = *state.borrow();
        if current == RecordingState::Stopped {
            break;
        }

        if current != RecordingState::Recording {
            // Paused: audio captured now must never be transcribed.
            let read = ring.read_since(cursor);
            cursor = read.next_cursor;
            batcher.reset_at(cursor);

            tokio::select! {
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                live = ring.wait_for_data(cursor) => {
                    if !live {
                        audio_ended(&hub).await;
                        break;
                    }
                }
            }
            continue;
        }

        let read = ring.read_since(cursor);
        if read.truncated {
            tracing::warn!("audio ring truncated; dropping in-progress utterance");
            batcher.reset_at(read.next_cursor - read.samples.len() as u64);
        }
        cursor = read.next_cursor;

        if read.samples.is_empty() {
            tokio::select! {
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                live = ring.wait_for_data(cursor) => {
                    if !live {
                        audio_ended(&hub).await;
                        break;
                    }
                }
            }
            continue;
        }

        for utterance in batcher.feed(&read.samples) {
            queue.push(utterance, enqueue_timeout).await;
        }
    }

    queue.close();
}

/// A dead audio source is fatal: broadcast the error, stop the session.
async fn audio_ended(hub: &HubHandle) {
    tracing::error!("audio stream ended; stopping session");
    hub.publish_error("audio_source", "audio stream ended").await;
    hub.shutdown().await;
}
