pub mod chunks;
pub mod tracker;
pub mod words;

pub use chunks::{decode_asr, AsrDecodeOptions, DecodedSpan, RawChunk, RawSegment, Stride};
pub use tracker::{GenerationTracker, TrackerConfig};
