use ndarray::{Array3, ArrayView1};
use ort::value::TensorRef;

use crate::asr::recognizer::{AsrError, AsrModel, InferenceConfig};

use super::state::{extract_top_tokens, DecoderOutputState, DecoderWorkspace, StepScores};

/// Decoder-joint state carried across the frames of one window.
pub struct DecoderSession {
    pub(crate) workspace: DecoderWorkspace,
    pub(crate) last_token: i32,
    pub(crate) vocab_size: usize,
    pub(crate) blank_idx: i32,
}

impl DecoderSession {
    pub(crate) fn new(model: &AsrModel) -> Result<Self, AsrError> {
        Ok(Self {
            workspace: DecoderWorkspace::new(model.decoder_session())?,
            last_token: model.blank_idx,
            vocab_size: model.vocab_size,
            blank_idx: model.blank_idx,
        })
    }

    pub(crate) fn step_scores(
        &mut self,
        model: &mut AsrModel,
        encoder_step: &ArrayView1<f32>,
        target_token: i32,
        state: &DecoderOutputState,
        config: &InferenceConfig,
        beam_width: usize,
    ) -> Result<StepScores, AsrError> {
        self.workspace.set_encoder_step(encoder_step);
        self.workspace.set_target(target_token);
        self.workspace.state = state.clone();

        let outs = model.decoder_session_mut().run(ort::inputs![
            "encoder_outputs" => TensorRef::from_array_view(self.workspace.encoder_step.view())?,
            "targets" => TensorRef::from_array_view(self.workspace.targets.view())?,
            "target_length" => TensorRef::from_array_view(self.workspace.target_length.view())?,
            "input_states_1" => TensorRef::from_array_view(self.workspace.state.0.view())?,
            "input_states_2" => TensorRef::from_array_view(self.workspace.state.1.view())?,
        ])?;

        let logits = outs
            .get("outputs")
            .ok_or_else(|| AsrError::OutputNotFound("outputs".into()))?
            .try_extract_array()?
            .remove_axis(ndarray::Axis(0));
        let slice = logits.as_slice().ok_or_else(|| {
            AsrError::Shape(ndarray::ShapeError::from_kind(
                ndarray::ErrorKind::IncompatibleShape,
            ))
        })?;
        // TDT heads append duration logits after the vocabulary.
        let slice = if slice.len() > self.vocab_size {
            &slice[..self.vocab_size]
        } else {
            slice
        };

        let blank_score = slice[self.blank_idx as usize];
        Ok(StepScores {
            blank_score,
            top_tokens: extract_top_tokens(
                slice,
                blank_score,
                config,
                beam_width,
                self.blank_idx as usize,
            ),
            output_state: (
                Self::extract_state(outs.get("output_states_1"), "output_states_1")?,
                Self::extract_state(outs.get("output_states_2"), "output_states_2")?,
            ),
        })
    }

    fn extract_state(
        out: Option<&ort::value::DynValue>,
        name: &str,
    ) -> Result<Array3<f32>, AsrError> {
        Ok(out
            .ok_or_else(|| AsrError::OutputNotFound(name.into()))?
            .try_extract_array()?
            .into_dimensionality()?
            .to_owned())
    }
}
