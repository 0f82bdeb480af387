//! The session hub: single point of serialization for session state and
//! fan-out coordinator for events.
//!
//! All mutations of recording state, focus, and knowledge pass through
//! the hub's command loop. Events fan out through per-subscriber bounded
//! buffers, so a slow subscriber can never back-pressure the pipeline:
//! it loses low-value messages first and is closed once it lags on
//! transcriptions.

use crate::context::manager::{ContextManager, Insight, SuggestedQuestions};
use crate::context::transcript::Transcription;
use crate::server::protocol::{ClientMessage, ServerMessage};
use crate::session::state::RecordingState;
use crate::session::subscriber::{PushOutcome, SubscriberBuffer, SubscriberId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Commands processed by the hub's serial control loop.
pub enum HubCommand {
    Subscribe {
        reply: oneshot::Sender<(SubscriberId, Arc<SubscriberBuffer>)>,
    },
    Unsubscribe {
        id: SubscriberId,
    },
    Client {
        id: SubscriberId,
        message: ClientMessage,
    },
    Transcription(Transcription),
    Insight(Insight),
    Questions(SuggestedQuestions),
    Error {
        kind: String,
        message: String,
    },
    Status {
        reply: oneshot::Sender<HubStatus>,
    },
    Shutdown,
}

/// Point-in-time hub statistics for the health/stats endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct HubStatus {
    pub recording: RecordingState,
    pub focus: String,
    pub subscribers: usize,
    pub transcriptions: u64,
    pub questions_received: u64,
    pub started_at: DateTime<Utc>,
}

/// Cloneable handle for talking to a running hub.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Registers a subscriber; returns its id and outbound buffer.
    pub async fn subscribe(&self) -> Option<(SubscriberId, Arc<SubscriberBuffer>)> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(HubCommand::Subscribe { reply }).await.ok()?;
        rx.await.ok()
    }

    pub async fn unsubscribe(&self, id: SubscriberId) {
        let _ = self.tx.send(HubCommand::Unsubscribe { id }).await;
    }

    pub async fn client_message(&self, id: SubscriberId, message: ClientMessage) {
        let _ = self.tx.send(HubCommand::Client { id, message }).await;
    }

    pub async fn publish_transcription(&self, transcription: Transcription) {
        let _ = self
            .tx
            .send(HubCommand::Transcription(transcription))
            .await;
    }

    pub async fn publish_insight(&self, insight: Insight) {
        let _ = self.tx.send(HubCommand::Insight(insight)).await;
    }

    pub async fn publish_questions(&self, questions: SuggestedQuestions) {
        let _ = self.tx.send(HubCommand::Questions(questions)).await;
    }

    pub async fn publish_error(&self, kind: &str, message: &str) {
        let _ = self
            .tx
            .send(HubCommand::Error {
                kind: kind.to_string(),
                message: message.to_string(),
            })
            .await;
    }

    pub async fn status(&self) -> Option<HubStatus> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(HubCommand::Status { reply }).await.ok()?;
        rx.await.ok()
    }

    /// Requests terminal shutdown; the hub broadcasts STOPPED and exits.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(HubCommand::Shutdown).await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The hub task.
pub struct Hub {
    rx: mpsc::Receiver<HubCommand>,
    context: Arc<ContextManager>,
    state_tx: watch::Sender<RecordingState>,
    subscribers: HashMap<SubscriberId, Arc<SubscriberBuffer>>,
    next_subscriber: u64,
    buffer_capacity: usize,
    transcriptions: u64,
    questions_received: u64,
    started_at: DateTime<Utc>,
}

impl Hub {
    pub fn new(
        context: Arc<ContextManager>,
        state_tx: watch::Sender<RecordingState>,
        buffer_capacity: usize,
    ) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(256);
        let hub = Self {
            rx,
            context,
            state_tx,
            subscribers: HashMap::new(),
            next_subscriber: 0,
            buffer_capacity,
            transcriptions: 0,
            questions_received: 0,
            started_at: Utc::now(),
        };
        (hub, HubHandle { tx })
    }

    /// Runs the control loop until shutdown.
    pub async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                HubCommand::Subscribe { reply } => self.handle_subscribe(reply),
                HubCommand::Unsubscribe { id } => self.remove_subscriber(id),
                HubCommand::Client { id, message } => self.handle_client(id, message),
                HubCommand::Transcription(transcription) => {
                    self.transcriptions += 1;
                    let event = ServerMessage::Transcription {
                        text: transcription.text,
                        batch_seq: transcription.batch_seq,
                        ts: transcription.ts,
                        error: transcription.error.is_some(),
                    };
                    self.broadcast(event);
                }
                HubCommand::Insight(insight) => {
                    self.broadcast(ServerMessage::Insight {
                        kind: insight.kind,
                        text: insight.text,
                        ts: insight.generated_at,
                    });
                }
                HubCommand::Questions(questions) => {
                    self.broadcast(ServerMessage::SuggestedQuestions {
                        questions: questions.questions,
                        rotated_index: questions.rotated_index,
                    });
                }
                HubCommand::Error { kind, message } => {
                    self.broadcast(ServerMessage::Error { kind, message });
                }
                HubCommand::Status { reply } => {
                    let _ = reply.send(self.status());
                }
                HubCommand::Shutdown => break,
            }
        }

        // Terminal teardown: tell everyone, then close.
        self.state_tx.send_replace(RecordingState::Stopped);
        let state_event = self.state_event();
        self.broadcast(state_event);
        for buffer in self.subscribers.values() {
            buffer.close();
        }
        tracing::info!("session hub stopped");
    }

    fn status(&self) -> HubStatus {
        HubStatus {
            recording: *self.state_tx.borrow(),
            focus: self.context.focus(),
            subscribers: self.subscribers.len(),
            transcriptions: self.transcriptions,
            questions_received: self.questions_received,
            started_at: self.started_at,
        }
    }

    fn handle_subscribe(&mut self, reply: oneshot::Sender<(SubscriberId, Arc<SubscriberBuffer>)>) {
        let id = SubscriberId(self.next_subscriber);
        self.next_subscriber += 1;
        let buffer = Arc::new(SubscriberBuffer::new(self.buffer_capacity));
        self.subscribers.insert(id, buffer.clone());
        tracing::debug!(%id, "subscriber connected");

        // New subscribers learn the session state right away.
        buffer.push(self.state_event());
        let _ = reply.send((id, buffer));
    }

    fn remove_subscriber(&mut self, id: SubscriberId) {
        if let Some(buffer) = self.subscribers.remove(&id) {
            buffer.close();
            tracing::debug!(%id, "subscriber disconnected");
        }
    }

    fn handle_client(&mut self, id: SubscriberId, message: ClientMessage) {
        match message {
            ClientMessage::Start => self.transition(RecordingState::Recording),
            ClientMessage::Stop => self.transition(RecordingState::Paused),
            ClientMessage::SetFocus { focus } => {
                // A repeated identical focus is a single state change.
                if self.context.focus() != focus {
                    self.context.set_focus(focus);
                    let event = self.state_event();
                    self.broadcast(event);
                }
            }
            ClientMessage::SetKnowledge { items } => {
                let count = items.len();
                self.context.set_knowledge(items);
                self.broadcast(ServerMessage::KnowledgeAck { count });
            }
            ClientMessage::Question {
                question,
                request_id,
            } => {
                self.questions_received += 1;
                let Some(buffer) = self.subscribers.get(&id).cloned() else {
                    return;
                };
                let context = self.context.clone();
                // Answered off the control loop; the push is discarded if
                // the subscriber disconnects in the meantime.
                tokio::spawn(async move {
                    let answer = context.answer_question(&question).await;
                    buffer.push(ServerMessage::Answer {
                        request_id,
                        answer: answer.text,
                        latency_ms: answer.latency.as_millis() as u64,
                        error: answer.error,
                    });
                });
            }
            ClientMessage::Ping => self.unicast(id, ServerMessage::Pong),
        }
    }

    fn transition(&mut self, next: RecordingState) {
        let current = *self.state_tx.borrow();
        if !current.can_transition_to(next) {
            return;
        }
        self.state_tx.send_replace(next);
        tracing::info!("session state: {current} -> {next}");
        let event = self.state_event();
        self.broadcast(event);
    }

    fn state_event(&self) -> ServerMessage {
        ServerMessage::State {
            recording: *self.state_tx.borrow(),
            focus: self.context.focus(),
        }
    }

    fn unicast(&mut self, id: SubscriberId, message: ServerMessage) {
        if let Some(buffer) = self.subscribers.get(&id)
            && buffer.push(message) == PushOutcome::Closed
        {
            self.remove_subscriber(id);
        }
    }

    fn broadcast(&mut self, message: ServerMessage) {
        let mut closed = Vec::new();
        for (&id, buffer) in &self.subscribers {
            if buffer.push(message.clone()) == PushOutcome::Closed {
                closed.push(id);
            }
        }
        for id in closed {
            tracing::warn!(%id, "closing lagging subscriber");
            self.remove_subscriber(id);
        }
    }
}
