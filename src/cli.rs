use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "scribe", about = "Scribe - timestamped transcripts of audio files")]
pub struct CliArgs {
    /// Audio file to transcribe (wav, flac or mp3)
    #[arg(required_unless_present = "worker")]
    pub audio: Option<PathBuf>,

    /// Model identifier, e.g. parakeet-tdt-0.6b-v3
    #[arg(long)]
    pub model: Option<String>,

    /// Hub cache directory to load models from and download into
    #[arg(long, env = "SCRIBE_MODEL_ROOT")]
    pub model_root: Option<PathBuf>,

    /// Run the worker in a child process instead of a thread
    #[arg(long)]
    pub isolated: bool,

    /// Print the transcript as JSON
    #[arg(long)]
    pub json: bool,

    /// Remember --model, --model-root and --isolated as defaults
    #[arg(long)]
    pub save: bool,

    /// Enable debug mode with verbose logging
    #[arg(long)]
    pub debug: bool,

    /// Serve worker requests over stdin/stdout
    #[arg(long, hide = true)]
    pub worker: bool,
}
