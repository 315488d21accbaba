//! The inference worker: takes requests one at a time, loads the requested
//! pipeline through the shared [`ModelCache`], and streams reconciled
//! transcript updates back to the host.

mod channel;
mod progress;
pub mod stdio;

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Instant;

use crate::asr::{validate_samples, PipelineEvent, RunOptions};
use crate::engine::ModelCache;
use crate::error::WorkerError;
use crate::protocol::{Envelope, HostMessage, SessionId};
use crate::streaming::{GenerationTracker, TrackerConfig};

pub use channel::{spawn_thread_worker, ThreadWorker, WorkerChannel};
pub use progress::ProgressReporter;
pub use stdio::{serve_stdio, ProcessWorker};

/// Where a worker delivers its messages.
pub trait MessageSink {
    fn send(&mut self, envelope: Envelope) -> Result<(), WorkerError>;
}

impl MessageSink for Vec<Envelope> {
    fn send(&mut self, envelope: Envelope) -> Result<(), WorkerError> {
        self.push(envelope);
        Ok(())
    }
}

impl MessageSink for Sender<Envelope> {
    fn send(&mut self, envelope: Envelope) -> Result<(), WorkerError> {
        Sender::send(self, envelope).map_err(|_| WorkerError::Disconnected)
    }
}

pub struct Worker {
    cache: Arc<ModelCache>,
    options: RunOptions,
    tracker: TrackerConfig,
}

impl Worker {
    pub fn new(cache: Arc<ModelCache>) -> Self {
        Self {
            cache,
            options: RunOptions::default(),
            tracker: TrackerConfig::default(),
        }
    }

    /// Handles one host message. Session failures are reported to the host
    /// and are not returned; only a lost host is an error here.
    pub fn dispatch(
        &self,
        message: HostMessage,
        sink: &mut dyn MessageSink,
    ) -> Result<(), WorkerError> {
        match message {
            HostMessage::InferenceRequest {
                session,
                audio,
                model_id,
            } => self.handle_request(session, &audio, &model_id, sink),
            HostMessage::Unknown => {
                log::warn!("Ignoring host message of unknown kind");
                Ok(())
            }
        }
    }

    /// Runs messages to completion in arrival order until the source ends.
    pub fn serve<I>(&self, incoming: I, sink: &mut dyn MessageSink) -> Result<(), WorkerError>
    where
        I: IntoIterator<Item = HostMessage>,
    {
        for message in incoming {
            log::debug!("Worker received {}", message.kind());
            self.dispatch(message, sink)?;
        }
        log::info!("Worker input closed; shutting down");
        Ok(())
    }

    pub fn handle_request(
        &self,
        session: SessionId,
        audio: &[f32],
        model_id: &str,
        sink: &mut dyn MessageSink,
    ) -> Result<(), WorkerError> {
        let start = Instant::now();
        log::info!(
            "Session {session}: {} samples with model {model_id}",
            audio.len()
        );

        let mut reporter = ProgressReporter::new(session, sink);
        match self.run_session(audio, model_id, &mut reporter) {
            Ok(()) => log::info!("Session {session} finished in {:?}", start.elapsed()),
            Err(err) if err.is_fatal_to_session() && !reporter.is_disconnected() => {
                log::warn!("Session {session} failed: {err}");
                reporter.fail(err.user_message());
            }
            Err(err) => log::debug!("Session {session} stopped: {err}"),
        }

        match reporter.take_sink_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn run_session(
        &self,
        audio: &[f32],
        model_id: &str,
        reporter: &mut ProgressReporter<'_>,
    ) -> Result<(), WorkerError> {
        validate_samples(audio).map_err(WorkerError::Decode)?;

        let handle = self
            .cache
            .get_or_load(model_id, &mut |progress| reporter.on_load_progress(progress))
            .map_err(WorkerError::PipelineLoad)?;
        reporter.loaded();

        let mut tracker = GenerationTracker::new(
            handle.tokenizer(),
            handle.config(),
            TrackerConfig {
                stride_length_s: self.options.stride_length_s,
                ..self.tracker.clone()
            },
        );

        let mut pipeline = handle.lock().map_err(WorkerError::Decode)?;
        let events = pipeline
            .run(audio, &self.options)
            .map_err(WorkerError::Decode)?;

        for event in events {
            let update = match event.map_err(WorkerError::Decode)? {
                PipelineEvent::DecodeStep(beams) => tracker.on_decode_step(&beams),
                PipelineEvent::ChunkBoundary(chunk) => tracker.on_chunk_boundary(chunk),
            };
            if let Some(message) = update {
                reporter.emit(message);
            }
            if reporter.is_disconnected() {
                return Err(WorkerError::Disconnected);
            }
        }

        reporter.emit(tracker.on_inference_complete());
        Ok(())
    }
}
