//! Per-model transcription counters, surfaced on the stats endpoint.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Counters for one model.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ModelCounters {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_latency_ms: u64,
}

impl ModelCounters {
    pub fn average_latency_ms(&self) -> f64 {
        if self.successes == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.successes as f64
        }
    }
}

/// Shared per-model counter table.
#[derive(Debug, Default)]
pub struct ModelStats {
    models: Mutex<HashMap<String, ModelCounters>>,
}

impl ModelStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self, model: &str) {
        self.entry(model, |c| c.attempts += 1);
    }

    pub fn record_success(&self, model: &str, latency: Duration) {
        self.entry(model, |c| {
            c.successes += 1;
            c.total_latency_ms += latency.as_millis() as u64;
        });
    }

    pub fn record_failure(&self, model: &str) {
        self.entry(model, |c| c.failures += 1);
    }

    fn entry(&self, model: &str, update: impl FnOnce(&mut ModelCounters)) {
        let mut models = self.models.lock().unwrap();
        update(models.entry(model.to_string()).or_default());
    }

    pub fn counters(&self, model: &str) -> ModelCounters {
        self.models
            .lock()
            .unwrap()
            .get(model)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of every model's counters.
    pub fn snapshot(&self) -> HashMap<String, ModelCounters> {
        self.models.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let stats = ModelStats::new();
        assert_eq!(stats.counters("whisper-1"), ModelCounters::default());
    }

    #[test]
    fn test_attempt_success_failure_counting() {
        let stats = ModelStats::new();
        stats.record_attempt("m");
        stats.record_attempt("m");
        stats.record_success("m", Duration::from_millis(120));
        stats.record_failure("m");

        let counters = stats.counters("m");
        assert_eq!(counters.attempts, 2);
        assert_eq!(counters.successes, 1);
        assert_eq!(counters.failures, 1);
        assert_eq!(counters.total_latency_ms, 120);
    }

    #[test]
    fn test_average_latency() {
        let stats = ModelStats::new();
        stats.record_success("m", Duration::from_millis(100));
        stats.record_success("m", Duration::from_millis(300));

        assert_eq!(stats.counters("m").average_latency_ms(), 200.0);
        assert_eq!(ModelCounters::default().average_latency_ms(), 0.0);
    }

    #[test]
    fn test_models_are_independent() {
        let stats = ModelStats::new();
        stats.record_attempt("a");
        stats.record_attempt("b");
        stats.record_attempt("b");

        assert_eq!(stats.counters("a").attempts, 1);
        assert_eq!(stats.counters("b").attempts, 2);
        assert_eq!(stats.snapshot().len(), 2);
    }
}
