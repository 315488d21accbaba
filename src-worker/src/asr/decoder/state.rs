use crate::asr::recognizer::{AsrError, InferenceConfig};
use crate::asr::Beam;
use ndarray::{Array, Array1, Array2, Array3, ArrayView1};

pub type DecoderOutputState = (Array3<f32>, Array3<f32>);

pub struct StepScores {
    pub blank_score: f32,
    pub top_tokens: Vec<(usize, f32)>,
    pub output_state: DecoderOutputState,
}

#[derive(Clone)]
pub struct Hypothesis {
    pub tokens: Vec<i32>,
    pub frames: Vec<usize>,
    pub score: f32,
    pub state: DecoderOutputState,
    pub last_token: i32,
}

impl Hypothesis {
    pub fn extend(&mut self, token: i32, frame: usize, score: f32, state: DecoderOutputState) {
        self.tokens.push(token);
        self.frames.push(frame);
        self.score += score;
        self.state = state;
        self.last_token = token;
    }

    pub fn to_beam(&self) -> Beam {
        Beam {
            output_token_ids: self.tokens.clone(),
            score: self.score,
        }
    }
}

#[derive(Debug)]
pub struct DecoderWorkspace {
    pub(super) encoder_step: Array3<f32>,
    pub(super) targets: Array2<i32>,
    pub(super) target_length: Array1<i32>,
    pub(super) state: DecoderOutputState,
}

impl DecoderWorkspace {
    pub fn new(session: &ort::session::Session) -> Result<Self, AsrError> {
        let encoder_dim = session
            .inputs
            .iter()
            .find(|i| i.name == "encoder_outputs")
            .and_then(|i| i.input_type.tensor_shape())
            .and_then(|s| s.get(1).copied())
            .and_then(|d| usize::try_from(d).ok())
            .unwrap_or(1024);

        let state_shape = |name: &str| {
            session
                .inputs
                .iter()
                .find(|i| i.name == name)
                .and_then(|i| i.input_type.tensor_shape())
                .map(|s| (s[0] as usize, s[2] as usize))
                .ok_or_else(|| AsrError::InputNotFound(name.to_string()))
        };
        let (s1_layers, s1_dim) = state_shape("input_states_1")?;
        let (s2_layers, s2_dim) = state_shape("input_states_2")?;

        Ok(Self {
            encoder_step: Array::zeros((1, encoder_dim, 1)),
            targets: Array2::zeros((1, 1)),
            target_length: Array1::from_vec(vec![1]),
            state: (
                Array::zeros((s1_layers, 1, s1_dim)),
                Array::zeros((s2_layers, 1, s2_dim)),
            ),
        })
    }

    pub fn set_encoder_step(&mut self, frame: &ArrayView1<f32>) {
        self.encoder_step
            .index_axis_mut(ndarray::Axis(2), 0)
            .index_axis_mut(ndarray::Axis(0), 0)
            .assign(frame);
    }

    pub fn set_target(&mut self, token: i32) {
        self.targets[[0, 0]] = token;
    }
}

/// Non-blank candidates ranked by logit, keeping only those that clear the
/// configured margin over blank.
pub fn extract_top_tokens(
    vocab_logits: &[f32],
    blank_score: f32,
    config: &InferenceConfig,
    beam_width: usize,
    blank_idx: usize,
) -> Vec<(usize, f32)> {
    let mut candidates: Vec<_> = vocab_logits
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != blank_idx)
        .map(|(i, &l)| (i, l))
        .filter(|(_, s)| {
            s.is_finite()
                && (config.min_blank_margin <= 0.0
                    || !blank_score.is_finite()
                    || (s - blank_score) >= config.min_blank_margin)
        })
        .collect();

    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
    candidates.truncate(beam_width.max(1));
    candidates
}
