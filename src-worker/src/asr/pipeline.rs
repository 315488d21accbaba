//! Boundary between the worker and a concrete speech model.
//!
//! A pipeline turns audio into a pull-based stream of [`PipelineEvent`]s, so
//! the reconciler can be driven the same way by a real model or by a scripted
//! event sequence.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::asr::recognizer::AsrError;
use crate::protocol::ProgressEvent;
use crate::streaming::chunks::{decode_asr, AsrDecodeOptions, DecodedSpan, RawChunk};

/// Shape parameters of the loaded model that affect timestamp conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Seconds of audio the feature extractor consumes per window.
    pub chunk_length: f64,
    /// Encoder positions per window, when the model reports it.
    pub max_source_positions: Option<usize>,
    pub sampling_rate: u32,
}

impl ModelConfig {
    /// Seconds per model-native time unit. An unknown or zero position count
    /// counts as one.
    pub fn time_precision(&self) -> f64 {
        let divisor = self.max_source_positions.filter(|&n| n > 0).unwrap_or(1);
        self.chunk_length / divisor as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Sampling filter size; `None` disables it.
    pub top_k: Option<usize>,
    pub do_sample: bool,
    pub chunk_length_s: f64,
    pub stride_length_s: f64,
    pub return_timestamps: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            top_k: None,
            do_sample: false,
            chunk_length_s: 30.0,
            stride_length_s: 5.0,
            return_timestamps: true,
        }
    }
}

/// One candidate hypothesis at a decoding step.
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    pub output_token_ids: Vec<i32>,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Current beams after one decoding step, best first.
    DecodeStep(Vec<Beam>),
    /// A window finished decoding.
    ChunkBoundary(RawChunk),
}

pub type PipelineRun<'a> = Box<dyn Iterator<Item = Result<PipelineEvent, AsrError>> + 'a>;

pub trait AsrPipeline: Send {
    fn run<'a>(
        &'a mut self,
        audio: &'a [f32],
        options: &RunOptions,
    ) -> Result<PipelineRun<'a>, AsrError>;
}

/// Token-level text decoding of a model's vocabulary.
pub trait TokenDecoder: Send + Sync {
    fn decode(&self, token_ids: &[i32], skip_special_tokens: bool) -> String;

    /// Timestamp-aware decode of a window history.
    fn decode_asr(&self, chunks: &[RawChunk], options: &AsrDecodeOptions) -> Vec<DecodedSpan> {
        decode_asr(chunks, options)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadProgress {
    /// Weight bytes fetched for one file.
    Download(ProgressEvent),
    /// All files are present; the model is being constructed.
    Constructing,
}

pub trait PipelineLoader: Send + Sync {
    fn load(
        &self,
        model_id: &str,
        on_progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<PipelineHandle, AsrError>;
}

/// A loaded pipeline plus what the reconciler needs to read its output.
pub struct PipelineHandle {
    model_id: String,
    config: ModelConfig,
    tokenizer: Arc<dyn TokenDecoder>,
    pipeline: Mutex<Box<dyn AsrPipeline>>,
}

impl PipelineHandle {
    pub fn new(
        model_id: impl Into<String>,
        config: ModelConfig,
        tokenizer: Arc<dyn TokenDecoder>,
        pipeline: Box<dyn AsrPipeline>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            config,
            tokenizer,
            pipeline: Mutex::new(pipeline),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> Arc<dyn TokenDecoder> {
        Arc::clone(&self.tokenizer)
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Box<dyn AsrPipeline>>, AsrError> {
        self.pipeline.lock().map_err(|_| AsrError::Busy)
    }
}

impl std::fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("model_id", &self.model_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_precision_uses_positions() {
        let config = ModelConfig {
            chunk_length: 30.0,
            max_source_positions: Some(1500),
            sampling_rate: 16_000,
        };
        assert!((config.time_precision() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn time_precision_guards_missing_divisor() {
        let mut config = ModelConfig {
            chunk_length: 30.0,
            max_source_positions: None,
            sampling_rate: 16_000,
        };
        assert_eq!(config.time_precision(), 30.0);
        config.max_source_positions = Some(0);
        assert_eq!(config.time_precision(), 30.0);
    }

    #[test]
    fn default_run_options_are_deterministic() {
        let options = RunOptions::default();
        assert_eq!(options.top_k, None);
        assert!(!options.do_sample);
        assert_eq!(options.chunk_length_s, 30.0);
        assert_eq!(options.stride_length_s, 5.0);
        assert!(options.return_timestamps);
    }
}
