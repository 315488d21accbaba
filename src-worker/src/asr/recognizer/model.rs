use super::config::AsrError;
use crate::asr::TokenDecoder;
use num_cpus::get_physical;
use ort::{
    execution_providers::CPUExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
};
use regex::Regex;
use std::{
    fs,
    path::Path,
    sync::{Arc, LazyLock},
    time::Instant,
};

const THREAD_ENV: &str = "ORT_THREADS";

fn resolve_thread_count() -> usize {
    if let Ok(value) = std::env::var(THREAD_ENV) {
        match value.parse::<usize>() {
            Ok(parsed) if parsed > 0 => {
                log::info!("Using ORT_THREADS override: {} threads", parsed);
                return parsed;
            }
            _ => log::warn!("Ignoring invalid ORT_THREADS value '{}'", value),
        }
    }
    get_physical()
}

/// SentencePiece vocabulary of the model; `<blk>` and `<...>` control
/// tokens count as special.
#[derive(Debug)]
pub struct Vocabulary {
    tokens: Vec<String>,
    blank_idx: i32,
}

impl Vocabulary {
    pub fn new(tokens: Vec<String>, blank_idx: i32) -> Self {
        Self { tokens, blank_idx }
    }

    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, AsrError> {
        let content = fs::read_to_string(dir.as_ref().join("vocab.txt"))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, AsrError> {
        let mut blank_idx = None;
        let entries: Vec<_> = content
            .lines()
            .filter_map(|l| {
                let mut p = l.split_whitespace();
                let t = p.next()?.replace('\u{2581}', " ");
                let i: usize = p.next()?.parse().ok()?;
                if t == "<blk>" {
                    blank_idx = Some(i as i32);
                }
                Some((t, i))
            })
            .collect();

        let mut tokens = vec![String::new(); entries.iter().map(|(_, i)| *i).max().unwrap_or(0) + 1];
        for (t, i) in entries {
            tokens[i] = t;
        }
        blank_idx.map(|idx| Self::new(tokens, idx)).ok_or_else(|| {
            AsrError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Missing <blk> token in vocabulary",
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn blank_idx(&self) -> i32 {
        self.blank_idx
    }

    pub fn token(&self, id: i32) -> Option<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.tokens.get(idx))
            .map(String::as_str)
    }

    pub fn is_special(&self, id: i32) -> bool {
        id == self.blank_idx
            || self
                .token(id)
                .is_none_or(|t| t.starts_with('<') && t.ends_with('>'))
    }
}

impl TokenDecoder for Vocabulary {
    fn decode(&self, token_ids: &[i32], skip_special_tokens: bool) -> String {
        let joined: String = token_ids
            .iter()
            .filter(|&&id| !(skip_special_tokens && self.is_special(id)))
            .filter_map(|&id| self.token(id))
            .collect();
        match &*DECODE_SPACE_RE {
            Ok(re) => re
                .replace_all(&joined, |c: &regex::Captures| {
                    if c.get(1).is_some() {
                        " "
                    } else {
                        ""
                    }
                })
                .to_string(),
            Err(_) => joined.trim().to_string(),
        }
    }
}

static DECODE_SPACE_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\A\s|\s\B|(\s)\b"));

pub struct AsrModel {
    pub(super) encoder: Session,
    pub(super) decoder_joint: Session,
    pub(super) preprocessor: Session,
    pub(crate) vocab: Arc<Vocabulary>,
    pub blank_idx: i32,
    pub vocab_size: usize,
}

impl Drop for AsrModel {
    fn drop(&mut self) {
        log::debug!("Dropping ASR model with {} vocab tokens", self.vocab_size);
    }
}

impl AsrModel {
    pub fn new<P: AsRef<Path>>(model_dir: P, quantized: bool) -> Result<Self, AsrError> {
        let start = Instant::now();
        let threads = resolve_thread_count();
        let encoder = Self::init_session(&model_dir, "encoder-model", threads, quantized)?;
        let decoder_joint =
            Self::init_session(&model_dir, "decoder_joint-model", threads, quantized)?;
        let preprocessor = Self::init_session(&model_dir, "nemo128", threads, false)?;
        let vocab = Vocabulary::load(&model_dir)?;
        let blank_idx = vocab.blank_idx();
        let vocab_size = vocab.len();

        log::info!(
            "ASR model initialized in {:?} ({} tokens, blank_idx={}, threads={})",
            start.elapsed(),
            vocab_size,
            blank_idx,
            threads
        );
        Ok(Self {
            encoder,
            decoder_joint,
            preprocessor,
            vocab: Arc::new(vocab),
            blank_idx,
            vocab_size,
        })
    }

    pub fn vocabulary(&self) -> Arc<Vocabulary> {
        Arc::clone(&self.vocab)
    }

    pub(crate) fn decoder_session(&self) -> &Session {
        &self.decoder_joint
    }

    pub(crate) fn decoder_session_mut(&mut self) -> &mut Session {
        &mut self.decoder_joint
    }

    fn init_session<P: AsRef<Path>>(
        dir: P,
        name: &str,
        threads: usize,
        try_q: bool,
    ) -> Result<Session, AsrError> {
        let mut file = format!("{name}.onnx");
        if try_q {
            let q = format!("{name}.int8.onnx");
            if dir.as_ref().join(&q).exists() {
                file = q;
            }
        }
        log::debug!("Creating ORT session from {file}");
        let opt = if cfg!(target_os = "windows") {
            GraphOptimizationLevel::Level1
        } else {
            GraphOptimizationLevel::Level3
        };
        Ok(Session::builder()?
            .with_optimization_level(opt)?
            .with_execution_providers(vec![CPUExecutionProvider::default().build()])?
            .with_parallel_execution(true)?
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?
            .commit_from_file(dir.as_ref().join(file))?)
    }
}
