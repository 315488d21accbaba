use crate::asr::LoadProgress;
use crate::error::WorkerError;
use crate::protocol::{Envelope, LoadingStatus, SessionId, WorkerMessage};

use super::MessageSink;

/// Emits one session's messages and keeps its download/loading flags.
///
/// Downloads and pipeline construction are reported with separate message
/// kinds. The loading flag goes up once and comes down once, on success or on
/// failure; a failure is reported as a single `Error` no matter how often
/// [`fail`](Self::fail) is called.
pub struct ProgressReporter<'a> {
    session: SessionId,
    sink: &'a mut dyn MessageSink,
    downloading: bool,
    loading: bool,
    loading_announced: bool,
    failed: bool,
    sink_error: Option<WorkerError>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(session: SessionId, sink: &'a mut dyn MessageSink) -> Self {
        Self {
            session,
            sink,
            downloading: false,
            loading: false,
            loading_announced: false,
            failed: false,
            sink_error: None,
        }
    }

    pub fn is_downloading(&self) -> bool {
        self.downloading
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn on_load_progress(&mut self, progress: LoadProgress) {
        match progress {
            LoadProgress::Download(event) => {
                self.downloading = true;
                log::trace!(
                    "Session {} downloading {} ({}/{})",
                    self.session,
                    event.file,
                    event.loaded,
                    event.total
                );
                self.emit(WorkerMessage::Downloading(event));
            }
            LoadProgress::Constructing => self.begin_loading(),
        }
    }

    pub fn begin_loading(&mut self) {
        if self.loading_announced || self.failed {
            return;
        }
        self.downloading = false;
        self.loading = true;
        self.loading_announced = true;
        self.emit(WorkerMessage::loading(LoadingStatus::Loading));
    }

    /// The pipeline is ready. A cached pipeline never announced construction,
    /// so the `loading` status is sent first in that case.
    pub fn loaded(&mut self) {
        if self.failed {
            return;
        }
        self.begin_loading();
        self.loading = false;
        self.emit(WorkerMessage::loading(LoadingStatus::Success));
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        if self.failed {
            log::debug!("Session {} already failed; dropping error", self.session);
            return;
        }
        self.failed = true;
        self.downloading = false;
        self.loading = false;

        let message = message.into();
        log::error!("Session {} failed: {message}", self.session);
        self.emit(WorkerMessage::error(message));
    }

    pub fn emit(&mut self, message: WorkerMessage) {
        if self.sink_error.is_some() {
            return;
        }
        if let Err(err) = self.sink.send(Envelope::new(self.session, message)) {
            log::warn!("Session {}: host unreachable: {err}", self.session);
            self.sink_error = Some(err);
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.sink_error.is_some()
    }

    /// First delivery failure, if the host went away mid-session.
    pub fn take_sink_error(&mut self) -> Option<WorkerError> {
        self.sink_error.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProgressEvent;

    fn kinds(sent: &[Envelope]) -> Vec<&'static str> {
        sent.iter().map(|e| e.message.kind()).collect()
    }

    #[test]
    fn download_then_construct_then_success() {
        let mut sent = Vec::new();
        let mut reporter = ProgressReporter::new(SessionId(1), &mut sent);
        reporter.on_load_progress(LoadProgress::Download(ProgressEvent::new("a", 1, 2)));
        assert!(reporter.is_downloading());
        reporter.on_load_progress(LoadProgress::Constructing);
        assert!(!reporter.is_downloading());
        assert!(reporter.is_loading());
        reporter.loaded();
        assert!(!reporter.is_loading());

        assert_eq!(kinds(&sent), vec!["downloading", "loading", "loading"]);
        assert_eq!(
            sent[2].message,
            WorkerMessage::loading(LoadingStatus::Success)
        );
    }

    #[test]
    fn cached_pipeline_still_announces_loading() {
        let mut sent = Vec::new();
        let mut reporter = ProgressReporter::new(SessionId(2), &mut sent);
        reporter.loaded();
        assert_eq!(
            sent.iter().map(|e| e.message.clone()).collect::<Vec<_>>(),
            vec![
                WorkerMessage::loading(LoadingStatus::Loading),
                WorkerMessage::loading(LoadingStatus::Success),
            ]
        );
    }

    #[test]
    fn failure_clears_flags_and_reports_once() {
        let mut sent = Vec::new();
        let mut reporter = ProgressReporter::new(SessionId(3), &mut sent);
        reporter.on_load_progress(LoadProgress::Download(ProgressEvent::new("a", 1, 2)));
        reporter.fail("network down");
        reporter.fail("again");
        reporter.loaded();
        assert!(!reporter.is_downloading());
        assert!(!reporter.is_loading());
        assert!(reporter.failed);
        assert_eq!(kinds(&sent), vec!["downloading", "error"]);
    }
}
