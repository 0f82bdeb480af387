//! Periodic AI tasks: automated insights and suggested-question rotation.
//!
//! Both tickers idle while the session is paused, resume cleanly when
//! recording restarts, and exit promptly on stop. AI failures are logged
//! and retried at the next tick; nothing retries inline, so a
//! rate-limited service is only probed once per interval.

use crate::context::manager::ContextManager;
use crate::session::hub::HubHandle;
use crate::session::state::RecordingState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Runs the insight ticker until the session stops.
///
/// A tick is skipped when the transcript version has not advanced since
/// the last successful tick, so unchanged content never costs tokens.
pub async fn run_insight_ticker(
    interval: Duration,
    context: Arc<ContextManager>,
    hub: HubHandle,
    mut state: watch::Receiver<RecordingState>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await; // first tick is immediate; skip it
    let mut last_version = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = state.changed() => {
                if changed.is_err() || *state.borrow() == RecordingState::Stopped {
                    return;
                }
                continue;
            }
        }

        if *state.borrow() == RecordingState::Stopped {
            return;
        }
        if *state.borrow() != RecordingState::Recording {
            continue;
        }

        let version = context.transcript().version();
        if version == last_version {
            tracing::debug!("insight tick skipped: transcript unchanged");
            continue;
        }

        match context.generate_insights().await {
            Ok(insights) => {
                last_version = version;
                if hub.is_closed() {
                    return;
                }
                for insight in insights {
                    hub.publish_insight(insight).await;
                }
            }
            Err(e) => {
                // Silent to clients; the next tick tries again.
                tracing::warn!("insight generation failed: {e}");
            }
        }
    }
}

/// Runs the dynamic-question ticker until the session stops.
///
/// Each tick regenerates exactly one rotating slot; ticks are skipped
/// while the transcript is empty.
pub async fn run_question_ticker(
    interval: Duration,
    context: Arc<ContextManager>,
    hub: HubHandle,
    mut state: watch::Receiver<RecordingState>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = state.changed() => {
                if changed.is_err() || *state.borrow() == RecordingState::Stopped {
                    return;
                }
                continue;
            }
        }

        if *state.borrow() == RecordingState::Stopped {
            return;
        }
        if *state.borrow() != RecordingState::Recording {
            continue;
        }
        if context.transcript().is_empty() {
            tracing::debug!("question tick skipped: transcript empty");
            continue;
        }

        match context.suggest_questions().await {
            Ok(questions) => {
                if hub.is_closed() {
                    return;
                }
                hub.publish_questions(questions).await;
            }
            Err(e) => {
                tracing::warn!("question rotation failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::MockGenerativeClient;
    use crate::context::manager::ContextConfig;
    use crate::context::transcript::{Transcript, test_transcription};
    use crate::session::hub::Hub;
    use crate::session::state::RecordingState;

    struct Fixture {
        context: Arc<ContextManager>,
        client: Arc<MockGenerativeClient>,
        hub: HubHandle,
        state_tx: watch::Sender<RecordingState>,
        transcript: Arc<Transcript>,
    }

    fn fixture(client: MockGenerativeClient) -> Fixture {
        let transcript = Arc::new(Transcript::new());
        let client = Arc::new(client);
        let context = Arc::new(ContextManager::new(
            ContextConfig::default(),
            client.clone(),
            transcript.clone(),
        ));
        let (state_tx, _) = watch::channel(RecordingState::Paused);
        let (hub, handle) = Hub::new(context.clone(), state_tx.clone(), 8);
        tokio::spawn(hub.run());
        Fixture {
            context,
            client,
            hub: handle,
            state_tx,
            transcript,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_insight_ticker_skips_unchanged_transcript() {
        let fx = fixture(MockGenerativeClient::new().with_default_response("A summary."));
        fx.transcript.append(test_transcription(0, "x")).unwrap();
        fx.state_tx.send_replace(RecordingState::Recording);

        let task = tokio::spawn(run_insight_ticker(
            Duration::from_secs(60),
            fx.context.clone(),
            fx.hub.clone(),
            fx.state_tx.subscribe(),
        ));

        // Two intervals, one content change: exactly one generation.
        tokio::time::sleep(Duration::from_secs(125)).await;
        assert_eq!(fx.client.call_count(), 1);

        fx.transcript.append(test_transcription(1, "y")).unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fx.client.call_count(), 2);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_insight_ticker_idles_while_paused() {
        let fx = fixture(MockGenerativeClient::new().with_default_response("A summary."));
        fx.transcript.append(test_transcription(0, "x")).unwrap();

        let task = tokio::spawn(run_insight_ticker(
            Duration::from_secs(60),
            fx.context.clone(),
            fx.hub.clone(),
            fx.state_tx.subscribe(),
        ));

        // Paused: ticks pass with no AI calls.
        tokio::time::sleep(Duration::from_secs(185)).await;
        assert_eq!(fx.client.call_count(), 0);

        // Resume and the next tick fires.
        fx.state_tx.send_replace(RecordingState::Recording);
        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(fx.client.call_count(), 1);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_insight_ticker_exits_on_stop() {
        let fx = fixture(MockGenerativeClient::new().with_default_response("A summary."));

        let task = tokio::spawn(run_insight_ticker(
            Duration::from_secs(60),
            fx.context.clone(),
            fx.hub.clone(),
            fx.state_tx.subscribe(),
        ));

        fx.state_tx.send_replace(RecordingState::Stopped);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("ticker should exit on stop")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_insight_ticker_retries_next_tick_after_failure() {
        let client = MockGenerativeClient::new()
            .with_failure(crate::error::ApiError::RateLimited { retry_after: None })
            .with_default_response("A summary.");
        let fx = fixture(client);
        fx.transcript.append(test_transcription(0, "x")).unwrap();
        fx.state_tx.send_replace(RecordingState::Recording);

        let task = tokio::spawn(run_insight_ticker(
            Duration::from_secs(60),
            fx.context.clone(),
            fx.hub.clone(),
            fx.state_tx.subscribe(),
        ));

        // First tick fails; no inline retry. Second tick succeeds even
        // though the version did not advance after the failure.
        tokio::time::sleep(Duration::from_secs(125)).await;
        assert_eq!(fx.client.call_count(), 2);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_question_ticker_skips_empty_transcript() {
        let fx = fixture(MockGenerativeClient::new().with_default_response("What next?"));
        fx.state_tx.send_replace(RecordingState::Recording);

        let task = tokio::spawn(run_question_ticker(
            Duration::from_secs(15),
            fx.context.clone(),
            fx.hub.clone(),
            fx.state_tx.subscribe(),
        ));

        tokio::time::sleep(Duration::from_secs(50)).await;
        assert_eq!(fx.client.call_count(), 0);

        fx.transcript.append(test_transcription(0, "x")).unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(fx.client.call_count() >= 1);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_question_ticker_exits_on_stop() {
        let fx = fixture(MockGenerativeClient::new());

        let task = tokio::spawn(run_question_ticker(
            Duration::from_secs(15),
            fx.context.clone(),
            fx.hub.clone(),
            fx.state_tx.subscribe(),
        ));

        fx.state_tx.send_replace(RecordingState::Stopped);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("ticker should exit on stop")
            .unwrap();
    }
}
