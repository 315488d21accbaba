use ndarray::ShapeError;

#[derive(thiserror::Error, Debug)]
pub enum AsrError {
    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ndarray shape error: {0}")]
    Shape(#[from] ShapeError),
    #[error("Model input not found: {0}")]
    InputNotFound(String),
    #[error("Model output not found: {0}")]
    OutputNotFound(String),
    #[error("Unsupported sample rate {0} Hz, expected 16000 Hz")]
    SampleRate(u32),
    #[error("Audio decode error: {0}")]
    Audio(String),
    #[error("Invalid inference options: {0}")]
    InvalidOptions(String),
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("Model snapshot not found under {0}")]
    SnapshotNotFound(String),
    #[error("Model download failed: {0}")]
    Download(String),
    #[error("Speech engine is busy")]
    Busy,
}

impl AsrError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Download(_) => {
                "Could not download the speech model. Check your internet connection and try again."
            }
            Self::SnapshotNotFound(_) => {
                "Speech model files are missing or corrupted. Remove the model cache and try again."
            }
            Self::UnknownModel(_) => "The requested speech model is not available.",
            Self::InvalidOptions(_) => "The transcription options are not supported.",
            Self::Audio(_) | Self::SampleRate(_) => {
                "Could not decode the audio. Submit mono 16 kHz audio and try again."
            }
            Self::Ort(_) | Self::InputNotFound(_) | Self::OutputNotFound(_) | Self::Shape(_) => {
                "The speech engine failed to run. Try again or download the model again."
            }
            Self::Io(_) => {
                "The worker could not read or write its local files. Check disk space and permissions."
            }
            Self::Busy => "The speech engine is busy. Please try again.",
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub max_tokens_per_step: usize,
    pub beam_width: usize,
    pub min_blank_margin: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_step: 10,
            beam_width: 1,
            min_blank_margin: 0.0,
        }
    }
}

impl InferenceConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides("SCRIBE_ASR_");
        config
    }

    fn apply_env_overrides(&mut self, prefix: &str) {
        let parse_env = |suffix: &str| std::env::var(format!("{prefix}{suffix}")).ok();

        if let Some(v) = parse_env("MIN_BLANK_MARGIN").and_then(|s| s.parse().ok()) {
            self.min_blank_margin = v;
        }
        if let Some(v) = parse_env("MAX_TOKENS_PER_STEP").and_then(|s| s.parse().ok()) {
            self.max_tokens_per_step = v;
        }
        if let Some(v) = parse_env("BEAM_WIDTH").and_then(|s| s.parse::<usize>().ok()) {
            self.beam_width = v.max(1);
        }
    }
}
