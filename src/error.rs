use thiserror::Error;

use scribe_worker_lib::asr::AsrError;
use scribe_worker_lib::protocol::SessionId;
use scribe_worker_lib::WorkerError;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("A transcription is already running (session {0})")]
    Busy(SessionId),

    #[error("Worker: {0}")]
    Transport(#[from] WorkerError),

    #[error("Audio: {0}")]
    Audio(#[from] AsrError),

    #[error("Settings: {0}")]
    Settings(String),

    #[error("Transcription failed: {0}")]
    Session(String),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}
