pub mod audio_io;
pub mod decoder;
pub mod model_store;
pub mod onnx;
mod pipeline;
mod recognizer;
pub mod window;

pub use audio_io::{load_audio, validate_samples, TARGET_SAMPLE_RATE};
pub use model_store::{ModelSpec, DEFAULT_MODEL_ID};
pub use onnx::{default_loader, OnnxLoader, OnnxPipeline};
pub use pipeline::{
    AsrPipeline, Beam, LoadProgress, ModelConfig, PipelineEvent, PipelineHandle, PipelineLoader,
    PipelineRun, RunOptions, TokenDecoder,
};
pub use recognizer::{AsrError, AsrModel, InferenceConfig, Vocabulary, WindowDecode};
