//! Parakeet TDT models exported to ONNX, run through `ort`.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use crate::asr::model_store::{self, ModelSpec};
use crate::asr::recognizer::{AsrError, AsrModel, InferenceConfig};
use crate::asr::window::{plan_windows, Window};
use crate::asr::{
    AsrPipeline, LoadProgress, PipelineEvent, PipelineHandle, PipelineLoader, PipelineRun,
    RunOptions, TARGET_SAMPLE_RATE,
};
use crate::streaming::chunks::RawChunk;
use crate::streaming::words::{tokens_to_words, words_to_segments};

/// Frames at the end of a window within which a trailing word counts as cut.
const EDGE_FRAMES: usize = 2;

pub struct OnnxPipeline {
    model: AsrModel,
    config: InferenceConfig,
}

impl OnnxPipeline {
    pub fn new(model: AsrModel, config: InferenceConfig) -> Self {
        Self { model, config }
    }
}

impl AsrPipeline for OnnxPipeline {
    fn run<'a>(
        &'a mut self,
        audio: &'a [f32],
        options: &RunOptions,
    ) -> Result<PipelineRun<'a>, AsrError> {
        if options.do_sample || options.top_k.is_some() {
            log::warn!("Sampling options are ignored; decoding is deterministic");
        }
        let windows = plan_windows(audio.len(), TARGET_SAMPLE_RATE, options)?;
        log::info!(
            "Decoding {} samples in {} window(s)",
            audio.len(),
            windows.len()
        );

        Ok(Box::new(WindowedRun {
            model: &mut self.model,
            config: &self.config,
            audio,
            windows: windows.into(),
            pending: VecDeque::new(),
            failed: false,
        }))
    }
}

/// Decodes one window per pull and hands out its events in order.
struct WindowedRun<'a> {
    model: &'a mut AsrModel,
    config: &'a InferenceConfig,
    audio: &'a [f32],
    windows: VecDeque<Window>,
    pending: VecDeque<PipelineEvent>,
    failed: bool,
}

impl WindowedRun<'_> {
    fn decode_next_window(&mut self, window: Window) -> Result<(), AsrError> {
        let audio = self.audio;
        let samples = &audio[window.range()];
        let pending = &mut self.pending;
        let decoded = self.model.decode_window(samples, self.config, &mut |beams| {
            pending.push_back(PipelineEvent::DecodeStep(beams))
        })?;

        let words = tokens_to_words(decoded.tokens);
        let segments =
            words_to_segments(&words, decoded.total_frames, window.is_last, EDGE_FRAMES);

        self.pending.push_back(PipelineEvent::ChunkBoundary(RawChunk {
            offset: window.offset,
            stride: window.stride,
            is_last: window.is_last,
            segments,
        }));
        Ok(())
    }
}

impl Iterator for WindowedRun<'_> {
    type Item = Result<PipelineEvent, AsrError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.failed {
                return None;
            }
            let window = self.windows.pop_front()?;
            if let Err(err) = self.decode_next_window(window) {
                self.failed = true;
                self.pending.clear();
                return Some(Err(err));
            }
        }
    }
}

/// Resolves model ids against the registry, fetches missing files and builds
/// ONNX pipelines.
pub struct OnnxLoader {
    model_root: Option<PathBuf>,
    config: InferenceConfig,
}

impl OnnxLoader {
    pub fn new(model_root: Option<PathBuf>, config: InferenceConfig) -> Self {
        Self { model_root, config }
    }
}

impl PipelineLoader for OnnxLoader {
    fn load(
        &self,
        model_id: &str,
        on_progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<PipelineHandle, AsrError> {
        let spec: &ModelSpec = model_store::lookup(model_id)
            .ok_or_else(|| AsrError::UnknownModel(model_id.to_string()))?;

        let root = self
            .model_root
            .as_ref()
            .map(|root| root.join(spec.cache_dir_name()))
            .unwrap_or_else(|| model_store::fallback_model_root(spec));

        let model_dir = model_store::resolve_model_dir(spec, &root, &mut |event| {
            on_progress(LoadProgress::Download(event))
        })?;

        on_progress(LoadProgress::Constructing);
        let model = AsrModel::new(&model_dir, true)?;
        let tokenizer = model.vocabulary();

        Ok(PipelineHandle::new(
            model_id,
            spec.config(),
            tokenizer,
            Box::new(OnnxPipeline::new(model, self.config.clone())),
        ))
    }
}

impl Default for OnnxLoader {
    fn default() -> Self {
        Self::new(None, InferenceConfig::from_env())
    }
}

pub fn default_loader(model_root: Option<PathBuf>) -> Box<dyn PipelineLoader> {
    Box::new(OnnxLoader::new(model_root, InferenceConfig::from_env()))
}
