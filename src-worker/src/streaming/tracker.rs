use std::sync::Arc;

use crate::asr::{Beam, ModelConfig, TokenDecoder};
use crate::protocol::{PartialTranscript, ProcessedChunk, TranscriptUpdate, WorkerMessage};
use crate::streaming::chunks::{AsrDecodeOptions, DecodedSpan, RawChunk};

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub stride_length_s: f64,
    /// Share of the stride assumed for a segment whose end is not known yet.
    pub end_fallback_factor: f64,
    /// Only every n-th decode step produces a preview.
    pub partial_every: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            stride_length_s: 5.0,
            end_fallback_factor: 0.9,
            partial_every: 10,
        }
    }
}

/// Reconciles a session's window history into one ordered transcript.
///
/// The whole history is re-decoded on every chunk boundary, so each update is
/// a pure function of everything observed so far.
pub struct GenerationTracker {
    tokenizer: Arc<dyn TokenDecoder>,
    config: TrackerConfig,
    decode_options: AsrDecodeOptions,
    chunks: Vec<RawChunk>,
    processed_chunks: Vec<ProcessedChunk>,
    step_counter: u64,
    finished: bool,
}

impl GenerationTracker {
    pub fn new(
        tokenizer: Arc<dyn TokenDecoder>,
        model: &ModelConfig,
        config: TrackerConfig,
    ) -> Self {
        let decode_options = AsrDecodeOptions {
            time_precision: model.time_precision(),
            sampling_rate: model.sampling_rate,
            force_full_sequence: false,
        };
        log::debug!(
            "Tracker created (time_precision={:.4}s, stride={}s)",
            decode_options.time_precision,
            config.stride_length_s
        );

        Self {
            tokenizer,
            config,
            decode_options,
            chunks: Vec::new(),
            processed_chunks: Vec::new(),
            step_counter: 0,
            finished: false,
        }
    }

    pub fn processed_chunks(&self) -> &[ProcessedChunk] {
        &self.processed_chunks
    }

    /// End of the last processed chunk, or 0 before any exist.
    pub fn completed_until(&self) -> u32 {
        self.processed_chunks.last().map(|c| c.end).unwrap_or(0)
    }

    pub fn on_chunk_boundary(&mut self, chunk: RawChunk) -> Option<WorkerMessage> {
        if self.finished {
            log::warn!("Ignoring chunk boundary after inference completed");
            return None;
        }

        self.chunks.push(chunk);
        let spans = self.tokenizer.decode_asr(&self.chunks, &self.decode_options);

        self.processed_chunks = spans
            .iter()
            .enumerate()
            .map(|(index, span)| self.process_span(span, index))
            .collect();

        log::debug!(
            "Chunk #{} reconciled into {} segments (completed until {}s)",
            self.chunks.len(),
            self.processed_chunks.len(),
            self.completed_until()
        );

        Some(WorkerMessage::Result(TranscriptUpdate {
            results: self.processed_chunks.clone(),
            is_done: false,
            completed_until: self.completed_until(),
        }))
    }

    pub fn on_decode_step(&mut self, beams: &[Beam]) -> Option<WorkerMessage> {
        if self.finished {
            return None;
        }

        self.step_counter += 1;
        if !self.step_counter.is_multiple_of(self.config.partial_every.max(1)) {
            return None;
        }

        let best = beams.first()?;
        let text = self.tokenizer.decode(&best.output_token_ids, true);

        Some(WorkerMessage::PartialResult {
            result: PartialTranscript {
                text,
                start: self.completed_until(),
                end: None,
            },
        })
    }

    pub fn on_inference_complete(&mut self) -> WorkerMessage {
        self.finished = true;
        log::info!(
            "Inference complete: {} chunks, {} segments, {} decode steps",
            self.chunks.len(),
            self.processed_chunks.len(),
            self.step_counter
        );
        WorkerMessage::InferenceDone
    }

    pub fn process_span(&self, span: &DecodedSpan, index: usize) -> ProcessedChunk {
        let start = to_seconds(span.start);
        let end = match span.end {
            Some(end) => to_seconds(end),
            None => to_seconds(
                span.start + self.config.end_fallback_factor * self.config.stride_length_s,
            ),
        };

        ProcessedChunk {
            index,
            text: span.text.trim().to_string(),
            start,
            end: end.max(start),
        }
    }
}

fn to_seconds(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}
