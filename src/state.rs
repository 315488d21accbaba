//! Host-side view of the worker: which session is in flight and what the
//! worker has reported for it.
//!
//! ```text
//! Idle → Downloading → Loading → Transcribing → Done
//!   └──────────┴──────────┴───────────┴───────→ Error
//! ```

use scribe_worker_lib::protocol::{
    Envelope, LoadingStatus, PartialTranscript, ProcessedChunk, ProgressEvent, SessionId,
    TranscriptUpdate, WorkerMessage,
};

use crate::error::HostError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Downloading,
    Loading,
    Transcribing,
    Done,
    Error,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// What an applied message changed, for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Ignored,
    Download(ProgressEvent),
    Status(Phase),
    /// The pipeline finished loading (or was already loaded).
    Ready,
    Transcript,
    Preview,
    Finished,
    Failed(String),
}

#[derive(Debug)]
pub struct HostState {
    last_session: SessionId,
    active: Option<SessionId>,
    phase: Phase,
    downloading: bool,
    loading: bool,
    transcript: Vec<ProcessedChunk>,
    completed_until: u32,
    partial: Option<PartialTranscript>,
    error: Option<String>,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            last_session: SessionId(0),
            active: None,
            phase: Phase::Idle,
            downloading: false,
            loading: false,
            transcript: Vec::new(),
            completed_until: 0,
            partial: None,
            error: None,
        }
    }
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.active
    }

    pub fn is_downloading(&self) -> bool {
        self.downloading
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some() && !self.phase.is_terminal()
    }

    pub fn transcript(&self) -> &[ProcessedChunk] {
        &self.transcript
    }

    pub fn completed_until(&self) -> u32 {
        self.completed_until
    }

    pub fn partial(&self) -> Option<&PartialTranscript> {
        self.partial.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Starts tracking a new request. Refused while another one is in flight.
    pub fn begin_session(&mut self) -> Result<SessionId, HostError> {
        if let Some(active) = self.active.filter(|_| self.is_busy()) {
            return Err(HostError::Busy(active));
        }

        let session = self.last_session.next();
        *self = Self {
            last_session: session,
            active: Some(session),
            ..Self::default()
        };
        log::debug!("Started session {session}");
        Ok(session)
    }

    pub fn apply(&mut self, envelope: Envelope) -> Change {
        let Envelope { session, message } = envelope;

        if self.active != Some(session) {
            log::warn!(
                "Ignoring {} for session {session}; active is {:?}",
                message.kind(),
                self.active
            );
            return Change::Ignored;
        }
        if self.phase.is_terminal() {
            log::warn!(
                "Ignoring {} for finished session {session}",
                message.kind()
            );
            return Change::Ignored;
        }

        match message {
            WorkerMessage::Downloading(event) => {
                if !matches!(self.phase, Phase::Idle | Phase::Downloading) {
                    log::warn!("Download progress after {:?}; ignoring", self.phase);
                    return Change::Ignored;
                }
                self.phase = Phase::Downloading;
                self.downloading = true;
                Change::Download(event)
            }
            WorkerMessage::Loading { status, message } => match status {
                LoadingStatus::Loading => {
                    self.downloading = false;
                    self.loading = true;
                    self.phase = Phase::Loading;
                    Change::Status(Phase::Loading)
                }
                LoadingStatus::Success => {
                    self.loading = false;
                    Change::Ready
                }
                LoadingStatus::Error => {
                    self.fail(message.unwrap_or_else(|| "The speech model failed to load".into()))
                }
            },
            WorkerMessage::Result(update) => {
                self.apply_update(update);
                Change::Transcript
            }
            WorkerMessage::PartialResult { result } => {
                self.phase = Phase::Transcribing;
                self.partial = Some(result);
                Change::Preview
            }
            WorkerMessage::InferenceDone => {
                self.phase = Phase::Done;
                self.downloading = false;
                self.loading = false;
                self.partial = None;
                Change::Finished
            }
            WorkerMessage::Error { message } => self.fail(message),
            WorkerMessage::Unknown => {
                log::warn!("Ignoring worker message of unknown kind");
                Change::Ignored
            }
        }
    }

    fn apply_update(&mut self, update: TranscriptUpdate) {
        self.phase = Phase::Transcribing;
        self.loading = false;
        if update.completed_until < self.completed_until {
            log::debug!(
                "Watermark moved back from {}s to {}s",
                self.completed_until,
                update.completed_until
            );
        }
        self.transcript = update.results;
        self.completed_until = update.completed_until;
        self.partial = None;
    }

    fn fail(&mut self, message: String) -> Change {
        self.phase = Phase::Error;
        self.downloading = false;
        self.loading = false;
        self.partial = None;
        self.error = Some(message.clone());
        Change::Failed(message)
    }
}
