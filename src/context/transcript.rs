//! The append-only session transcript.
//!
//! One writer (the dispatcher's committer) appends in batch-sequence
//! order; tickers and the Q&A handler read versioned snapshots without
//! blocking the writer.

use chrono::{DateTime, Utc};
use std::sync::RwLock;
use std::time::Duration;

/// One committed transcription. Never mutated after append.
#[derive(Debug, Clone)]
pub struct Transcription {
    pub batch_seq: u64,
    pub text: String,
    pub model_used: String,
    pub latency: Duration,
    pub confidence: Option<f32>,
    /// Set when every model failed for this utterance; `text` is empty.
    pub error: Option<String>,
    pub ts: DateTime<Utc>,
}

impl Transcription {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A consistent read of the transcript at one version.
#[derive(Debug, Clone)]
pub struct TranscriptSnapshot {
    pub version: u64,
    pub text: String,
    pub entries: usize,
}

impl TranscriptSnapshot {
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

struct TranscriptInner {
    entries: Vec<Transcription>,
    version: u64,
}

/// Append-only ordered transcript with a monotonic version counter.
pub struct Transcript {
    inner: RwLock<TranscriptInner>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(TranscriptInner {
                entries: Vec::new(),
                version: 0,
            }),
        }
    }

    /// Appends the next transcription and returns the new version.
    ///
    /// Appends must arrive in dense batch-sequence order; the committer
    /// guarantees that, and this check catches anything that slips past it.
    pub fn append(&self, transcription: Transcription) -> crate::error::Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let expected = inner.entries.last().map(|t| t.batch_seq + 1).unwrap_or(0);
        if transcription.batch_seq != expected {
            return Err(crate::error::ColloquyError::Session {
                message: format!(
                    "out-of-order transcript append: expected seq {expected}, got {}",
                    transcription.batch_seq
                ),
            });
        }
        inner.entries.push(transcription);
        inner.version += 1;
        Ok(inner.version)
    }

    pub fn version(&self) -> u64 {
        self.inner.read().unwrap().version
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Versioned snapshot with the rendered transcript text.
    ///
    /// Errored entries contribute no text but keep their place in the
    /// timeline.
    pub fn snapshot(&self) -> TranscriptSnapshot {
        let inner = self.inner.read().unwrap();
        let mut lines = Vec::with_capacity(inner.entries.len());
        for entry in &inner.entries {
            if entry.text.is_empty() {
                continue;
            }
            lines.push(format!(
                "[{}] {}",
                entry.ts.format("%H:%M:%S"),
                entry.text
            ));
        }
        TranscriptSnapshot {
            version: inner.version,
            text: lines.join("\n"),
            entries: inner.entries.len(),
        }
    }

    /// Last committed batch sequence, if any.
    pub fn last_seq(&self) -> Option<u64> {
        self.inner
            .read()
            .unwrap()
            .entries
            .last()
            .map(|t| t.batch_seq)
    }
}

#[cfg(test)]
pub(crate) fn test_transcription(batch_seq: u64, text: &str) -> Transcription {
    Transcription {
        batch_seq,
        text: text.to_string(),
        model_used: "test-model".to_string(),
        latency: Duration::from_millis(10),
        confidence: None,
        error: None,
        ts: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty_at_version_zero() {
        let transcript = Transcript::new();
        assert_eq!(transcript.version(), 0);
        assert!(transcript.is_empty());
        assert!(transcript.snapshot().is_empty());
    }

    #[test]
    fn test_append_increments_version() {
        let transcript = Transcript::new();
        assert_eq!(
            transcript.append(test_transcription(0, "hello")).unwrap(),
            1
        );
        assert_eq!(
            transcript.append(test_transcription(1, "world")).unwrap(),
            2
        );
        assert_eq!(transcript.version(), 2);
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn test_append_rejects_out_of_order_seq() {
        let transcript = Transcript::new();
        transcript.append(test_transcription(0, "a")).unwrap();

        assert!(transcript.append(test_transcription(2, "skip")).is_err());
        assert!(transcript.append(test_transcription(0, "dup")).is_err());
        assert_eq!(transcript.version(), 1);
    }

    #[test]
    fn test_first_append_must_be_seq_zero() {
        let transcript = Transcript::new();
        assert!(transcript.append(test_transcription(3, "late")).is_err());
    }

    #[test]
    fn test_snapshot_renders_timestamped_lines() {
        let transcript = Transcript::new();
        transcript.append(test_transcription(0, "first")).unwrap();
        transcript.append(test_transcription(1, "second")).unwrap();

        let snapshot = transcript.snapshot();
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.entries, 2);

        let lines: Vec<&str> = snapshot.text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("first"));
        assert!(lines[1].contains("second"));
        assert!(lines[0].starts_with('['));
    }

    #[test]
    fn test_errored_entries_keep_place_but_no_text() {
        let transcript = Transcript::new();
        transcript.append(test_transcription(0, "before")).unwrap();

        let mut errored = test_transcription(1, "");
        errored.error = Some("all models failed".to_string());
        transcript.append(errored).unwrap();

        transcript.append(test_transcription(2, "after")).unwrap();

        let snapshot = transcript.snapshot();
        assert_eq!(snapshot.entries, 3);
        assert_eq!(snapshot.text.lines().count(), 2);
        assert_eq!(transcript.last_seq(), Some(2));
    }

    #[test]
    fn test_snapshot_does_not_block_reader_consistency() {
        let transcript = Transcript::new();
        transcript.append(test_transcription(0, "a")).unwrap();

        let before = transcript.snapshot();
        transcript.append(test_transcription(1, "b")).unwrap();
        let after = transcript.snapshot();

        // The earlier snapshot is unchanged by the later append.
        assert_eq!(before.version, 1);
        assert_eq!(before.entries, 1);
        assert_eq!(after.version, 2);
        assert_eq!(after.entries, 2);
    }
}
