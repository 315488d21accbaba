pub mod download;
mod paths;

pub use paths::{default_hub_root, fallback_model_root, missing_model_files, resolve_model_dir};

use crate::asr::ModelConfig;

const HF_ENDPOINT: &str = "https://huggingface.co";
const HF_ENDPOINT_ENV: &str = "HF_ENDPOINT";

const PARAKEET_FILES: &[&str] = &[
    "encoder-model.int8.onnx",
    "decoder_joint-model.int8.onnx",
    "nemo128.onnx",
    "vocab.txt",
];

/// 30 s windows over 375 encoder positions, 80 ms per frame.
const PARAKEET_CONFIG: ModelConfig = ModelConfig {
    chunk_length: 30.0,
    max_source_positions: Some(375),
    sampling_rate: 16_000,
};

/// A downloadable model: where it lives and what it needs on disk.
#[derive(Debug)]
pub struct ModelSpec {
    pub id: &'static str,
    pub repo: &'static str,
    pub files: &'static [&'static str],
    config: ModelConfig,
}

impl ModelSpec {
    pub fn config(&self) -> ModelConfig {
        self.config.clone()
    }

    /// Directory name used by the Hugging Face hub cache.
    pub fn cache_dir_name(&self) -> String {
        format!("models--{}", self.repo.replace('/', "--"))
    }

    pub fn base_url(&self) -> String {
        let endpoint = std::env::var(HF_ENDPOINT_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| HF_ENDPOINT.to_string());
        format!("{}/{}/resolve/main", endpoint.trim_end_matches('/'), self.repo)
    }
}

pub static REGISTRY: &[ModelSpec] = &[
    ModelSpec {
        id: "parakeet-tdt-0.6b-v3",
        repo: "istupakov/parakeet-tdt-0.6b-v3-onnx",
        files: PARAKEET_FILES,
        config: PARAKEET_CONFIG,
    },
    ModelSpec {
        id: "parakeet-tdt-0.6b-v2",
        repo: "istupakov/parakeet-tdt-0.6b-v2-onnx",
        files: PARAKEET_FILES,
        config: PARAKEET_CONFIG,
    },
];

pub const DEFAULT_MODEL_ID: &str = "parakeet-tdt-0.6b-v3";

pub fn lookup(model_id: &str) -> Option<&'static ModelSpec> {
    REGISTRY.iter().find(|spec| spec.id == model_id)
}
