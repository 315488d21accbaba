//! Scripted stand-ins for a model pipeline and its loader.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use scribe_worker_lib::asr::window::plan_windows;
use scribe_worker_lib::asr::{
    AsrError, AsrPipeline, Beam, LoadProgress, ModelConfig, PipelineEvent, PipelineHandle,
    PipelineLoader, PipelineRun, RunOptions, TokenDecoder, TARGET_SAMPLE_RATE,
};
use scribe_worker_lib::protocol::{Envelope, ProgressEvent, WorkerMessage};
use scribe_worker_lib::streaming::{RawChunk, RawSegment};

pub const SR: usize = TARGET_SAMPLE_RATE as usize;

/// Whisper-style geometry: 30 s over 1500 positions, 20 ms per unit.
pub fn whisper_config() -> ModelConfig {
    ModelConfig {
        chunk_length: 30.0,
        max_source_positions: Some(1500),
        sampling_rate: TARGET_SAMPLE_RATE,
    }
}

pub fn silence(seconds: usize) -> Vec<f32> {
    vec![0.0; seconds * SR]
}

/// Decodes token `n` as `tN`; token 0 is special.
pub struct NumberTokenizer;

impl TokenDecoder for NumberTokenizer {
    fn decode(&self, token_ids: &[i32], skip_special_tokens: bool) -> String {
        token_ids
            .iter()
            .filter(|&&id| !(skip_special_tokens && id == 0))
            .map(|id| format!("t{id}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Pretends one word is spoken every second, at `k + 0.2 .. k + 0.8`.
///
/// Windows are planned from the run options the same way the ONNX pipeline
/// plans them. A word that runs past the edge of a non-final window is left
/// open.
pub struct ScriptedPipeline {
    pub steps_per_window: usize,
    /// Fail with a decode error when asked for this window.
    pub fail_at_window: Option<usize>,
}

impl ScriptedPipeline {
    pub fn new(steps_per_window: usize) -> Self {
        Self {
            steps_per_window,
            fail_at_window: None,
        }
    }

    fn window_events(&self, chunk: RawChunk) -> Vec<PipelineEvent> {
        let mut events: Vec<PipelineEvent> = (1..=self.steps_per_window)
            .map(|n| {
                PipelineEvent::DecodeStep(vec![Beam {
                    output_token_ids: (0..=n as i32).collect(),
                    score: -(n as f32),
                }])
            })
            .collect();
        events.push(PipelineEvent::ChunkBoundary(chunk));
        events
    }
}

pub fn scripted_segments(offset: usize, len: usize, is_last: bool) -> Vec<RawSegment> {
    let precision = whisper_config().time_precision();
    let window_start = offset as f64 / SR as f64;
    let window_end = (offset + len) as f64 / SR as f64;

    (window_start.floor() as usize..window_end.ceil() as usize)
        .filter_map(|k| {
            let start = k as f64 + 0.2;
            let end = k as f64 + 0.8;
            if start < window_start || start >= window_end {
                return None;
            }
            let rel = |t: f64| ((t - window_start) / precision).round() as u32;
            let end = (is_last || end <= window_end).then(|| rel(end));
            Some(RawSegment::new(format!(" w{k}"), rel(start), end))
        })
        .collect()
}

impl AsrPipeline for ScriptedPipeline {
    fn run<'a>(
        &'a mut self,
        audio: &'a [f32],
        options: &RunOptions,
    ) -> Result<PipelineRun<'a>, AsrError> {
        let windows = plan_windows(audio.len(), TARGET_SAMPLE_RATE, options)?;
        let fail_at = self.fail_at_window;

        let events = windows
            .into_iter()
            .enumerate()
            .flat_map(move |(i, window)| {
                if fail_at == Some(i) {
                    return vec![Err(AsrError::Audio("scripted decode failure".into()))];
                }
                let chunk = RawChunk {
                    offset: window.offset,
                    stride: window.stride,
                    is_last: window.is_last,
                    segments: scripted_segments(
                        window.offset,
                        window.stride.chunk_len,
                        window.is_last,
                    ),
                };
                self.window_events(chunk)
                    .into_iter()
                    .map(Ok)
                    .collect()
            });

        let mut failed = false;
        Ok(Box::new(events.take_while(move |event| {
            let keep = !failed;
            failed |= event.is_err();
            keep
        })))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoaderScript {
    Succeed,
    /// One download tick, then the connection drops.
    NetworkFailure,
    /// Files arrive, construction fails.
    ConstructionFailure,
}

/// Counts loads and replays a fixed progress script.
pub struct ScriptedLoader {
    pub script: LoaderScript,
    pub loads: Arc<AtomicUsize>,
    pub steps_per_window: usize,
    pub fail_at_window: Option<usize>,
}

impl ScriptedLoader {
    pub fn new(script: LoaderScript) -> Self {
        Self {
            script,
            loads: Arc::new(AtomicUsize::new(0)),
            steps_per_window: 12,
            fail_at_window: None,
        }
    }

    pub fn load_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }
}

impl PipelineLoader for ScriptedLoader {
    fn load(
        &self,
        model_id: &str,
        on_progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<PipelineHandle, AsrError> {
        self.loads.fetch_add(1, Ordering::SeqCst);

        on_progress(LoadProgress::Download(ProgressEvent::new(
            "model.onnx",
            512,
            1024,
        )));
        if self.script == LoaderScript::NetworkFailure {
            return Err(AsrError::Download("connection reset by peer".into()));
        }
        on_progress(LoadProgress::Download(ProgressEvent::new(
            "model.onnx",
            1024,
            1024,
        )));
        on_progress(LoadProgress::Constructing);
        if self.script == LoaderScript::ConstructionFailure {
            return Err(AsrError::OutputNotFound("logits".into()));
        }

        let mut pipeline = ScriptedPipeline::new(self.steps_per_window);
        pipeline.fail_at_window = self.fail_at_window;
        Ok(PipelineHandle::new(
            model_id,
            whisper_config(),
            Arc::new(NumberTokenizer),
            Box::new(pipeline),
        ))
    }
}

pub fn kinds(sent: &[Envelope]) -> Vec<&'static str> {
    sent.iter().map(|e| e.message.kind()).collect()
}

pub fn watermarks(sent: &[Envelope]) -> Vec<u32> {
    sent.iter()
        .filter_map(|e| match &e.message {
            WorkerMessage::Result(update) => Some(update.completed_until),
            _ => None,
        })
        .collect()
}
