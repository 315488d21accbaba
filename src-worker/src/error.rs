use thiserror::Error;

use crate::asr::AsrError;

/// Failures of one worker session or of the worker's transport.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Pipeline load failed: {0}")]
    PipelineLoad(#[source] AsrError),

    #[error("Decoding failed: {0}")]
    Decode(#[source] AsrError),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Transport: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Serialization: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Worker disconnected")]
    Disconnected,
}

impl WorkerError {
    /// Text sent to the host in an `Error` message.
    pub fn user_message(&self) -> String {
        match self {
            Self::PipelineLoad(err) | Self::Decode(err) => {
                format!("{} ({err})", err.user_message())
            }
            other => other.to_string(),
        }
    }

    pub fn is_fatal_to_session(&self) -> bool {
        matches!(self, Self::PipelineLoad(_) | Self::Decode(_))
    }
}

impl serde::Serialize for WorkerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
