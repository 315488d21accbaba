use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::engine::ModelCache;
use crate::error::WorkerError;
use crate::protocol::{Envelope, HostMessage};

use super::Worker;

/// Host side of a connection to a worker.
pub trait WorkerChannel {
    fn submit(&mut self, message: HostMessage) -> Result<(), WorkerError>;

    /// Blocks until the worker sends its next message.
    fn recv(&mut self) -> Result<Envelope, WorkerError>;
}

/// A worker running on a dedicated thread of the host process.
pub struct ThreadWorker {
    requests: Option<Sender<HostMessage>>,
    messages: Receiver<Envelope>,
    thread: Option<JoinHandle<()>>,
}

impl ThreadWorker {
    pub fn spawn(worker: Worker) -> Result<Self, WorkerError> {
        let (request_tx, request_rx) = mpsc::channel::<HostMessage>();
        let (message_tx, message_rx) = mpsc::channel::<Envelope>();

        let thread = thread::Builder::new()
            .name("scribe-worker".into())
            .spawn(move || {
                let mut sink = message_tx;
                if let Err(err) = worker.serve(request_rx, &mut sink) {
                    log::warn!("Worker thread stopped: {err}");
                }
            })?;

        log::debug!("Spawned worker thread");
        Ok(Self {
            requests: Some(request_tx),
            messages: message_rx,
            thread: Some(thread),
        })
    }
}

pub fn spawn_thread_worker(cache: Arc<ModelCache>) -> Result<ThreadWorker, WorkerError> {
    ThreadWorker::spawn(Worker::new(cache))
}

impl WorkerChannel for ThreadWorker {
    fn submit(&mut self, message: HostMessage) -> Result<(), WorkerError> {
        self.requests
            .as_ref()
            .ok_or(WorkerError::Disconnected)?
            .send(message)
            .map_err(|_| WorkerError::Disconnected)
    }

    fn recv(&mut self) -> Result<Envelope, WorkerError> {
        self.messages.recv().map_err(|_| WorkerError::Disconnected)
    }
}

impl Drop for ThreadWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop after the
        // current request.
        self.requests.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Worker thread panicked");
            }
        }
    }
}
