pub mod config;
mod inference;
mod model;

pub use config::{AsrError, InferenceConfig};
pub use inference::WindowDecode;
pub use model::{AsrModel, Vocabulary};
