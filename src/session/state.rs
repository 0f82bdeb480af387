//! Session recording state machine.

use serde::{Deserialize, Serialize};

/// Recording state of a session.
///
/// `Paused ⇄ Recording`, with `Stopped` terminal: once a session stops,
/// every task tears down and no transition leaves `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordingState {
    Paused,
    Recording,
    Stopped,
}

impl RecordingState {
    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: RecordingState) -> bool {
        match self {
            RecordingState::Stopped => false,
            _ => self != next,
        }
    }

    pub fn is_live(self) -> bool {
        self != RecordingState::Stopped
    }
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecordingState::Paused => "PAUSED",
            RecordingState::Recording => "RECORDING",
            RecordingState::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paused_and_recording_alternate() {
        assert!(RecordingState::Paused.can_transition_to(RecordingState::Recording));
        assert!(RecordingState::Recording.can_transition_to(RecordingState::Paused));
    }

    #[test]
    fn test_self_transitions_are_noops() {
        assert!(!RecordingState::Paused.can_transition_to(RecordingState::Paused));
        assert!(!RecordingState::Recording.can_transition_to(RecordingState::Recording));
    }

    #[test]
    fn test_stopped_is_terminal() {
        assert!(!RecordingState::Stopped.can_transition_to(RecordingState::Recording));
        assert!(!RecordingState::Stopped.can_transition_to(RecordingState::Paused));
        assert!(!RecordingState::Stopped.is_live());
        assert!(RecordingState::Paused.is_live());
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(
            serde_json::to_string(&RecordingState::Paused).unwrap(),
            "\"PAUSED\""
        );
        assert_eq!(
            serde_json::to_string(&RecordingState::Recording).unwrap(),
            "\"RECORDING\""
        );
        assert_eq!(RecordingState::Stopped.to_string(), "STOPPED");
    }
}
