//! JSON-lines transport for a worker running as a child process.
//!
//! The child reads one [`HostMessage`] per line on stdin and writes one
//! [`Envelope`] per line on stdout. Logs go to stderr.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::error::WorkerError;
use crate::protocol::{Envelope, HostMessage, WorkerMessage};

use super::{MessageSink, Worker, WorkerChannel};

pub const WORKER_FLAG: &str = "--worker";

/// Writes each envelope as one JSON line and flushes it.
pub struct JsonLineSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLineSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MessageSink for JsonLineSink<W> {
    fn send(&mut self, envelope: Envelope) -> Result<(), WorkerError> {
        serde_json::to_writer(&mut self.writer, &envelope)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

fn parse_request(line: &[u8]) -> Result<HostMessage, WorkerError> {
    serde_json::from_slice(line).map_err(|e| WorkerError::MalformedMessage(e.to_string()))
}

/// Reads the next non-blank line into `buf` as raw bytes. Returns `false` at
/// end of input. Lines are not required to be valid UTF-8.
fn next_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> Result<bool, WorkerError> {
    loop {
        buf.clear();
        if reader.read_until(b'\n', buf)? == 0 {
            return Ok(false);
        }
        if !buf.trim_ascii().is_empty() {
            return Ok(true);
        }
    }
}

/// Serves requests read from `reader` until it reaches end of input.
pub fn serve_lines<R: BufRead>(
    worker: &Worker,
    mut reader: R,
    sink: &mut dyn MessageSink,
) -> Result<(), WorkerError> {
    let mut line = Vec::new();
    while next_line(&mut reader, &mut line)? {
        match parse_request(line.trim_ascii()) {
            Ok(message) => worker.dispatch(message, sink)?,
            Err(err) => log::warn!("Skipping request line: {err}"),
        }
    }
    log::info!("Worker stdin closed; shutting down");
    Ok(())
}

/// Entry point of a `--worker` child process.
pub fn serve_stdio(worker: &Worker) -> Result<(), WorkerError> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut sink = JsonLineSink::new(BufWriter::new(stdout.lock()));
    serve_lines(worker, stdin.lock(), &mut sink)
}

/// Host side of a worker child process.
pub struct ProcessWorker {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: BufReader<ChildStdout>,
}

impl ProcessWorker {
    /// Starts `program` with `args` followed by [`WORKER_FLAG`].
    pub fn spawn(program: &Path, args: &[OsString]) -> Result<Self, WorkerError> {
        let mut child = Command::new(program)
            .args(args)
            .arg(WORKER_FLAG)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child.stdin.take().ok_or(WorkerError::Disconnected)?;
        let stdout = child.stdout.take().ok_or(WorkerError::Disconnected)?;
        log::debug!("Spawned worker process {}", child.id());

        Ok(Self {
            child,
            stdin: Some(BufWriter::new(stdin)),
            stdout: BufReader::new(stdout),
        })
    }

    /// Re-executes the current binary as a worker.
    pub fn spawn_current_exe(args: &[OsString]) -> Result<Self, WorkerError> {
        let exe = std::env::current_exe()?;
        Self::spawn(&exe, args)
    }
}

impl WorkerChannel for ProcessWorker {
    fn submit(&mut self, message: HostMessage) -> Result<(), WorkerError> {
        let stdin = self.stdin.as_mut().ok_or(WorkerError::Disconnected)?;
        let payload = serde_json::to_string(&message)?;
        stdin.write_all(payload.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Envelope, WorkerError> {
        let mut line = Vec::new();
        loop {
            if !next_line(&mut self.stdout, &mut line)? {
                return Err(WorkerError::Disconnected);
            }
            let bytes = line.trim_ascii();

            match serde_json::from_slice::<Envelope>(bytes) {
                Ok(envelope) if envelope.message == WorkerMessage::Unknown => {
                    log::warn!(
                        "Skipping worker message of unknown kind: {}",
                        String::from_utf8_lossy(bytes)
                    );
                }
                Ok(envelope) => return Ok(envelope),
                Err(err) => log::warn!("Skipping malformed worker line: {err}"),
            }
        }
    }
}

impl Drop for ProcessWorker {
    fn drop(&mut self) {
        self.stdin.take();
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
