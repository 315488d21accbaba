use serde::{Deserialize, Serialize};

/// Sample layout of one decode window: its length and how much of each edge
/// overlaps the neighbouring windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stride {
    pub chunk_len: usize,
    pub left: usize,
    pub right: usize,
}

/// A timed fragment inside one window, in model-native units relative to the
/// window start. `end` is `None` while the fragment is still open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    pub text: String,
    pub start: u32,
    pub end: Option<u32>,
}

impl RawSegment {
    pub fn new(text: impl Into<String>, start: u32, end: Option<u32>) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// Output of one decode window, exactly as the model produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChunk {
    /// Position of the window's first sample in the full input.
    pub offset: usize,
    pub stride: Stride,
    pub is_last: bool,
    pub segments: Vec<RawSegment>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AsrDecodeOptions {
    /// Seconds per model-native time unit.
    pub time_precision: f64,
    pub sampling_rate: u32,
    /// Close any open trailing segment at its window edge instead of leaving
    /// its end unresolved.
    pub force_full_sequence: bool,
}

/// One stitched `(text, (start, end))` span, in seconds of input audio.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSpan {
    pub text: String,
    pub start: f64,
    pub end: Option<f64>,
}

/// Stitches the full window history into one time-ordered span list.
///
/// Consecutive windows overlap by their strides. A window owns the audio from
/// the end of its left stride up to the start of its right stride, so each
/// instant is covered by exactly one window. The newest window in `chunks` has
/// no successor yet and keeps its right stride too; once the next window
/// arrives that overlap is handed over, which is how later audio revises the
/// text near a boundary.
///
/// Windows whose strides do not line up, or that arrive out of order, never
/// reach back to or before the last span already stitched: the result is always
/// ordered by `start`.
pub fn decode_asr(chunks: &[RawChunk], options: &AsrDecodeOptions) -> Vec<DecodedSpan> {
    let sr = options.sampling_rate.max(1) as f64;
    let mut spans: Vec<DecodedSpan> = Vec::new();

    for (i, chunk) in chunks.iter().enumerate() {
        let window_start = chunk.offset as f64 / sr;
        let window_end = window_start + chunk.stride.chunk_len as f64 / sr;
        let owned_from = if i == 0 {
            f64::NEG_INFINITY
        } else {
            window_start + chunk.stride.left as f64 / sr
        };
        let stitched_to = spans.last().map(|last| last.start);
        let is_tail = i + 1 == chunks.len();
        let owned_to = if is_tail || chunk.is_last {
            f64::INFINITY
        } else {
            window_start + chunk.stride.chunk_len.saturating_sub(chunk.stride.right) as f64 / sr
        };

        let mut window_spans: Vec<DecodedSpan> = chunk
            .segments
            .iter()
            .filter(|segment| !segment.text.trim().is_empty())
            .filter_map(|segment| {
                let start = window_start + segment.start as f64 * options.time_precision;
                if start < owned_from
                    || start >= owned_to
                    || stitched_to.is_some_and(|last| start <= last)
                {
                    return None;
                }
                let end = match segment.end {
                    Some(end) => Some(window_start + end as f64 * options.time_precision),
                    None if options.force_full_sequence => Some(window_end),
                    None => None,
                };
                Some(DecodedSpan {
                    text: segment.text.clone(),
                    start,
                    end: end.map(|end| end.max(start)),
                })
            })
            .collect();

        window_spans.sort_by(|a, b| a.start.total_cmp(&b.start));
        spans.extend(window_spans);
    }

    spans
}
