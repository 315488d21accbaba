use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use scribe_worker_lib::asr::{default_loader, load_audio, DEFAULT_MODEL_ID, TARGET_SAMPLE_RATE};
use scribe_worker_lib::protocol::{HostMessage, ProcessedChunk};
use scribe_worker_lib::worker::{ProcessWorker, ThreadWorker};
use scribe_worker_lib::{serve_stdio, ModelCache, Worker, WorkerChannel};

use crate::cli::CliArgs;
use crate::error::HostError;
use crate::render;
use crate::settings::{get_settings, save_settings, Settings};
use crate::state::{Change, HostState, Phase};

/// Effective options after merging flags over saved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub model_id: String,
    pub model_root: Option<PathBuf>,
    pub isolated: bool,
}

impl RunConfig {
    pub fn resolve(args: &CliArgs, settings: &Settings) -> Self {
        Self {
            model_id: args
                .model
                .clone()
                .or_else(|| settings.model_id.clone())
                .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            model_root: args
                .model_root
                .clone()
                .or_else(|| settings.model_path.as_ref().map(PathBuf::from)),
            isolated: args.isolated || settings.isolated,
        }
    }

    fn worker_args(&self) -> Vec<OsString> {
        match &self.model_root {
            Some(root) => vec!["--model-root".into(), root.clone().into_os_string()],
            None => Vec::new(),
        }
    }
}

fn build_worker(model_root: Option<PathBuf>) -> Worker {
    Worker::new(Arc::new(ModelCache::new(default_loader(model_root))))
}

fn open_channel(config: &RunConfig) -> Result<Box<dyn WorkerChannel>, HostError> {
    if config.isolated {
        log::info!("Starting isolated worker process");
        Ok(Box::new(ProcessWorker::spawn_current_exe(
            &config.worker_args(),
        )?))
    } else {
        Ok(Box::new(ThreadWorker::spawn(build_worker(
            config.model_root.clone(),
        ))?))
    }
}

/// Entry point for `--worker`: answer requests on stdin until it closes.
pub fn run_worker(args: &CliArgs) -> Result<(), HostError> {
    let worker = build_worker(args.model_root.clone());
    serve_stdio(&worker)?;
    Ok(())
}

/// Submits one request and drives `state` until the session finishes.
///
/// `on_change` sees every message that changed the state, in arrival order.
pub fn transcribe<F>(
    channel: &mut dyn WorkerChannel,
    state: &mut HostState,
    audio: Vec<f32>,
    model_id: &str,
    mut on_change: F,
) -> Result<Vec<ProcessedChunk>, HostError>
where
    F: FnMut(&HostState, &Change),
{
    let session = state.begin_session()?;
    channel.submit(HostMessage::InferenceRequest {
        session,
        audio,
        model_id: model_id.to_string(),
    })?;

    loop {
        let change = state.apply(channel.recv()?);
        if change != Change::Ignored {
            on_change(state, &change);
        }
        match change {
            Change::Finished => return Ok(state.transcript().to_vec()),
            Change::Failed(message) => return Err(HostError::Session(message)),
            _ => {}
        }
    }
}

fn report(state: &HostState, change: &Change) {
    match change {
        Change::Download(event) => log::info!("{}", render::format_progress(event)),
        Change::Status(Phase::Loading) => log::info!("Loading speech model"),
        Change::Status(phase) => log::debug!("Worker phase {phase:?}"),
        Change::Ready => log::info!("Speech model ready"),
        Change::Transcript => {
            log::debug!(
                "{} chunks final up to {}",
                state.transcript().len(),
                render::format_timestamp(state.completed_until())
            );
        }
        Change::Preview => {
            if let Some(partial) = state.partial() {
                eprintln!(
                    "… [{}] {}",
                    render::format_timestamp(partial.start),
                    partial.text
                );
            }
        }
        Change::Finished => log::info!("Transcription finished"),
        Change::Failed(_) | Change::Ignored => {}
    }
}

pub fn run(args: &CliArgs) -> Result<(), HostError> {
    let settings = get_settings();
    let config = RunConfig::resolve(args, &settings);

    if args.save {
        save_settings(&Settings {
            model_id: Some(config.model_id.clone()),
            model_path: config
                .model_root
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            isolated: config.isolated,
        })?;
    }

    let path = args
        .audio
        .as_ref()
        .ok_or_else(|| HostError::Session("no audio file given".into()))?;
    let audio = load_audio(path)?;
    let duration = (audio.len() as u64 / TARGET_SAMPLE_RATE as u64) as u32;
    log::info!(
        "Transcribing {} ({}) with {}",
        path.display(),
        render::format_timestamp(duration),
        config.model_id
    );

    let mut channel = open_channel(&config)?;
    let mut state = HostState::new();
    let chunks = transcribe(
        channel.as_mut(),
        &mut state,
        audio,
        &config.model_id,
        report,
    )?;

    let output = if args.json {
        render::transcript_json(&config.model_id, &chunks, duration)?
    } else {
        render::format_transcript(&chunks)
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{output}")?;
    stdout.flush()?;
    Ok(())
}
