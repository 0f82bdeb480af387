//! The context manager: owns the AI-facing view of the session.
//!
//! All three derived operations are pure functions of
//! `(transcript snapshot, focus, knowledge, now)`: each call snapshots the
//! transcript version and text before invoking the model, and results
//! carry `covers_up_to_version` so consumers can tell what they reflect.
//! Rate discipline lives in the callers (the tickers); 429s propagate out
//! of here as typed failures.

use crate::ai::client::{GenerationRequest, GenerativeClient};
use crate::config::Config;
use crate::context::knowledge::{KnowledgeItem, render_knowledge};
use crate::context::prompts;
use crate::context::transcript::Transcript;
use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// Configuration for prompt assembly and generation calls.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub num_dynamic_questions: usize,
    pub knowledge_budget_bytes: usize,
    pub max_conversation_length: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: crate::defaults::GENERATIVE_MAX_TOKENS,
            temperature: crate::defaults::GENERATIVE_TEMPERATURE,
            num_dynamic_questions: crate::defaults::NUM_DYNAMIC_QUESTIONS,
            knowledge_budget_bytes: crate::defaults::KNOWLEDGE_BUDGET_BYTES,
            max_conversation_length: crate::defaults::MAX_CONVERSATION_LENGTH,
        }
    }
}

impl ContextConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_tokens: config.ai.max_tokens,
            temperature: config.ai.temperature,
            num_dynamic_questions: config.ai.num_dynamic_questions,
            knowledge_budget_bytes: config.ai.knowledge_budget_bytes,
            max_conversation_length: config.ai.max_conversation_length,
        }
    }
}

/// Kinds of automated meeting insights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsightKind {
    Summary,
    ActionItem,
    Question,
}

/// One AI-generated insight.
#[derive(Debug, Clone)]
pub struct Insight {
    pub kind: InsightKind,
    pub text: String,
    pub generated_at: DateTime<Utc>,
    pub covers_up_to_version: u64,
}

/// The current suggested-question list: the fixed first slot plus the
/// rotating slots, with the index that changed this tick.
#[derive(Debug, Clone)]
pub struct SuggestedQuestions {
    pub questions: Vec<String>,
    pub rotated_index: usize,
    pub covers_up_to_version: u64,
}

/// Result of a live Q&A call. Never an Err: failures come back as an
/// apology with the error flag set, so the subscriber always gets an
/// answer for its request id.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub latency: Duration,
    pub covers_up_to_version: u64,
    pub error: bool,
}

struct Rotation {
    slots: Vec<String>,
    cursor: usize,
}

/// Aggregates the transcript and derives AI prompts.
pub struct ContextManager {
    config: ContextConfig,
    client: Arc<dyn GenerativeClient>,
    transcript: Arc<Transcript>,
    focus: RwLock<String>,
    knowledge: RwLock<Vec<KnowledgeItem>>,
    rotation: Mutex<Rotation>,
    history: Mutex<VecDeque<(String, String)>>,
}

impl ContextManager {
    pub fn new(
        config: ContextConfig,
        client: Arc<dyn GenerativeClient>,
        transcript: Arc<Transcript>,
    ) -> Self {
        let slots: Vec<String> = prompts::DEFAULT_QUESTIONS
            .iter()
            .cycle()
            .take(config.num_dynamic_questions)
            .map(|s| s.to_string())
            .collect();

        Self {
            config,
            client,
            transcript,
            focus: RwLock::new(String::new()),
            knowledge: RwLock::new(Vec::new()),
            rotation: Mutex::new(Rotation { slots, cursor: 0 }),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn transcript(&self) -> &Arc<Transcript> {
        &self.transcript
    }

    pub fn set_focus(&self, focus: String) {
        *self.focus.write().unwrap() = focus;
    }

    pub fn focus(&self) -> String {
        self.focus.read().unwrap().clone()
    }

    pub fn set_knowledge(&self, items: Vec<KnowledgeItem>) {
        *self.knowledge.write().unwrap() = items;
    }

    pub fn knowledge_count(&self) -> usize {
        self.knowledge.read().unwrap().len()
    }

    fn generation_request(&self, prompt: String) -> GenerationRequest {
        GenerationRequest {
            prompt,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    /// Answers a live question over the full transcript.
    pub async fn answer_question(&self, question: &str) -> Answer {
        let snapshot = self.transcript.snapshot();
        let focus = self.focus();
        let (knowledge, truncated) = {
            let items = self.knowledge.read().unwrap();
            render_knowledge(&items, self.config.knowledge_budget_bytes)
        };
        let history: Vec<(String, String)> =
            self.history.lock().unwrap().iter().cloned().collect();

        let prompt = prompts::qa_prompt(
            &focus,
            &knowledge,
            truncated,
            &snapshot.text,
            &history,
            question,
        );

        let started = Instant::now();
        match self.client.generate(self.generation_request(prompt)).await {
            Ok(text) => {
                let mut history = self.history.lock().unwrap();
                history.push_back((question.to_string(), text.clone()));
                while history.len() > self.config.max_conversation_length {
                    history.pop_front();
                }
                Answer {
                    text,
                    latency: started.elapsed(),
                    covers_up_to_version: snapshot.version,
                    error: false,
                }
            }
            Err(e) => {
                tracing::warn!("question answering failed: {e}");
                Answer {
                    text: "Sorry, I ran into a problem answering that question. Please try again."
                        .to_string(),
                    latency: started.elapsed(),
                    covers_up_to_version: snapshot.version,
                    error: true,
                }
            }
        }
    }

    /// Generates a batch of mixed-kind insights over the full transcript.
    pub async fn generate_insights(&self) -> Result<Vec<Insight>, ApiError> {
        let snapshot = self.transcript.snapshot();
        let prompt = prompts::insights_prompt(&self.focus(), &snapshot.text);

        let raw = self.client.generate(self.generation_request(prompt)).await?;
        let generated_at = Utc::now();

        Ok(parse_insights(&raw)
            .into_iter()
            .map(|(kind, text)| Insight {
                kind,
                text,
                generated_at,
                covers_up_to_version: snapshot.version,
            })
            .collect())
    }

    /// Regenerates one rotating suggested-question slot.
    ///
    /// On an empty transcript the static defaults are returned without an
    /// AI call; the rotation cursor does not advance.
    pub async fn suggest_questions(&self) -> Result<SuggestedQuestions, ApiError> {
        let snapshot = self.transcript.snapshot();

        if snapshot.is_empty() {
            let slots = self.rotation.lock().unwrap().slots.clone();
            return Ok(SuggestedQuestions {
                questions: assemble_questions(&slots),
                rotated_index: 0,
                covers_up_to_version: snapshot.version,
            });
        }

        let (cursor, existing) = {
            let rotation = self.rotation.lock().unwrap();
            (rotation.cursor, rotation.slots.clone())
        };

        let prompt = prompts::question_prompt(&self.focus(), &snapshot.text, &existing);
        let raw = self.client.generate(self.generation_request(prompt)).await?;

        let mut rotation = self.rotation.lock().unwrap();
        if let Some(question) = extract_question(&raw) {
            rotation.slots[cursor] = question;
        }
        let questions = assemble_questions(&rotation.slots);
        rotation.cursor = (rotation.cursor + 1) % rotation.slots.len();

        Ok(SuggestedQuestions {
            questions,
            // Position of the regenerated slot in the full list, after the
            // fixed first entry.
            rotated_index: cursor + 1,
            covers_up_to_version: snapshot.version,
        })
    }
}

fn assemble_questions(slots: &[String]) -> Vec<String> {
    let mut questions = Vec::with_capacity(slots.len() + 1);
    questions.push(prompts::FIXED_FIRST_QUESTION.to_string());
    questions.extend(slots.iter().cloned());
    questions
}

/// Pulls the first plausible question line out of a model response.
fn extract_question(raw: &str) -> Option<String> {
    for line in raw.lines() {
        let cleaned = line
            .trim()
            .trim_start_matches(['-', '*', '•', ' '])
            .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
            .trim();
        if !cleaned.is_empty() && cleaned.ends_with('?') {
            return Some(cleaned.to_string());
        }
    }
    None
}

/// Lenient line-oriented classifier for insight output.
///
/// Bullet markers mean action items, a trailing question mark means a
/// question, and everything else is summary text. Markers win over the
/// question mark, so "- confirm the deadline?" stays an action item.
pub fn parse_insights(raw: &str) -> Vec<(InsightKind, String)> {
    let mut insights = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let (kind, text) = if let Some(rest) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
            .or_else(|| trimmed.strip_prefix("• "))
        {
            (InsightKind::ActionItem, rest.trim())
        } else if trimmed.ends_with('?') {
            (InsightKind::Question, trimmed)
        } else {
            (InsightKind::Summary, trimmed)
        };

        if !text.is_empty() {
            insights.push((kind, text.to_string()));
        }
    }

    insights
}
