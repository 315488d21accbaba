//! Messages exchanged between the host and the inference worker.
//!
//! Every worker message travels inside an [`Envelope`] that names the session
//! it belongs to, so a host can tell a late message from an earlier request
//! apart from the one it is currently waiting on.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one inference request end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl SessionId {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Host → worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    InferenceRequest {
        session: SessionId,
        audio: Vec<f32>,
        model_id: String,
    },
    #[serde(other)]
    Unknown,
}

impl HostMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InferenceRequest { .. } => "inference_request",
            Self::Unknown => "unknown",
        }
    }
}

/// One tick of a model weight download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub file: String,
    /// Fraction of `file` fetched so far, in `0.0..=1.0`.
    pub progress: f64,
    pub loaded: u64,
    pub total: u64,
}

impl ProgressEvent {
    pub fn new(file: impl Into<String>, loaded: u64, total: u64) -> Self {
        let progress = if total == 0 {
            0.0
        } else {
            (loaded as f64 / total as f64).clamp(0.0, 1.0)
        };
        Self {
            file: file.into(),
            progress,
            loaded,
            total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingStatus {
    Loading,
    Success,
    Error,
}

/// A reconciled transcript segment, in whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedChunk {
    pub index: usize,
    pub text: String,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptUpdate {
    pub results: Vec<ProcessedChunk>,
    pub is_done: bool,
    pub completed_until: u32,
}

/// Preview of the text currently being decoded. `end` stays unresolved
/// until the next chunk boundary replaces the preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialTranscript {
    pub text: String,
    pub start: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u32>,
}

/// Worker → host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Downloading(ProgressEvent),
    Loading {
        status: LoadingStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Result(TranscriptUpdate),
    PartialResult {
        result: PartialTranscript,
    },
    InferenceDone,
    Error {
        message: String,
    },
    #[serde(other)]
    Unknown,
}

impl WorkerMessage {
    pub fn loading(status: LoadingStatus) -> Self {
        Self::Loading {
            status,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Downloading(_) => "downloading",
            Self::Loading { .. } => "loading",
            Self::Result(_) => "result",
            Self::PartialResult { .. } => "partial_result",
            Self::InferenceDone => "inference_done",
            Self::Error { .. } => "error",
            Self::Unknown => "unknown",
        }
    }

    /// Whether no further messages follow for the same session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::InferenceDone
                | Self::Error { .. }
                | Self::Loading {
                    status: LoadingStatus::Error,
                    ..
                }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub session: SessionId,
    #[serde(flatten)]
    pub message: WorkerMessage,
}

impl Envelope {
    pub fn new(session: SessionId, message: WorkerMessage) -> Self {
        Self { session, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_fraction_is_clamped() {
        assert_eq!(ProgressEvent::new("a", 5, 10).progress, 0.5);
        assert_eq!(ProgressEvent::new("a", 20, 10).progress, 1.0);
        assert_eq!(ProgressEvent::new("a", 20, 0).progress, 0.0);
    }

    #[test]
    fn envelope_wire_shape_is_flat() {
        let env = Envelope::new(SessionId(3), WorkerMessage::InferenceDone);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json, serde_json::json!({"session": 3, "type": "inference_done"}));
    }

    #[test]
    fn partial_result_omits_unresolved_end() {
        let msg = WorkerMessage::PartialResult {
            result: PartialTranscript {
                text: "hello".into(),
                start: 4,
                end: None,
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json["result"].get("end").is_none());
    }

    #[test]
    fn terminal_kinds() {
        assert!(WorkerMessage::InferenceDone.is_terminal());
        assert!(WorkerMessage::error("x").is_terminal());
        assert!(!WorkerMessage::loading(LoadingStatus::Success).is_terminal());
        assert!(!WorkerMessage::Unknown.is_terminal());
    }
}
