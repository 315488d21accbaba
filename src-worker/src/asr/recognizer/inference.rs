use std::time::Instant;

use ndarray::{Array1, ArrayD, ArrayView2, ArrayViewD, IxDyn};
use ort::inputs;
use ort::value::TensorRef;

use super::config::{AsrError, InferenceConfig};
use super::model::AsrModel;
use crate::asr::decoder::{DecoderSession, StepObserver};
use crate::streaming::words::TokenWithTime;

/// Tokens decoded from one window, with the window's encoder frame count.
#[derive(Debug, Clone)]
pub struct WindowDecode {
    pub tokens: Vec<TokenWithTime>,
    pub total_frames: usize,
}

impl AsrModel {
    pub fn preprocess(
        &mut self,
        waveforms: &ArrayViewD<f32>,
        waveforms_lens: &ArrayViewD<i64>,
    ) -> Result<(ArrayD<f32>, ArrayD<i64>), AsrError> {
        let wv = waveforms.as_standard_layout();
        let wl = waveforms_lens.as_standard_layout();
        let start = Instant::now();
        let outputs = self.preprocessor.run(inputs![
            "waveforms" => TensorRef::from_array_view(wv.view())?,
            "waveforms_lens" => TensorRef::from_array_view(wl.view())?,
        ])?;
        log::debug!("Preprocessor inference completed in {:?}", start.elapsed());

        Ok((
            outputs
                .get("features")
                .ok_or_else(|| AsrError::OutputNotFound("features".into()))?
                .try_extract_array()?
                .to_owned(),
            outputs
                .get("features_lens")
                .ok_or_else(|| AsrError::OutputNotFound("features_lens".into()))?
                .try_extract_array()?
                .to_owned(),
        ))
    }

    pub fn encode(
        &mut self,
        audio_signal: &ArrayViewD<f32>,
        length: &ArrayViewD<i64>,
    ) -> Result<(ArrayD<f32>, ArrayD<i64>), AsrError> {
        let sig = audio_signal.as_standard_layout();
        let len = length.as_standard_layout();
        let start = Instant::now();
        let outputs = self.encoder.run(inputs![
            "audio_signal" => TensorRef::from_array_view(sig.view())?,
            "length" => TensorRef::from_array_view(len.view())?,
        ])?;
        log::debug!("Encoder inference completed in {:?}", start.elapsed());

        let out = outputs
            .get("outputs")
            .ok_or_else(|| AsrError::OutputNotFound("outputs".into()))?
            .try_extract_array()?
            .permuted_axes(IxDyn(&[0, 2, 1]))
            .to_owned();
        let lens = outputs
            .get("encoded_lengths")
            .ok_or_else(|| AsrError::OutputNotFound("encoded_lengths".into()))?
            .try_extract_array()?
            .to_owned();

        Ok((out, lens))
    }

    /// Runs one window through preprocessor, encoder and decoder. `on_step`
    /// sees the beams after every decoding step.
    pub fn decode_window(
        &mut self,
        samples: &[f32],
        config: &InferenceConfig,
        on_step: &mut StepObserver<'_>,
    ) -> Result<WindowDecode, AsrError> {
        let window_start = Instant::now();
        let samples_len = samples.len();
        let audio = ArrayView2::from_shape((1, samples_len), samples)?.into_dyn();
        let audio_lengths = Array1::from_vec(vec![samples_len as i64]).into_dyn();

        let (features, features_lens) = self.preprocess(&audio, &audio_lengths.view())?;
        let (encoder_out, encoder_out_lens) =
            self.encode(&features.view(), &features_lens.view())?;

        let encodings = encoder_out.index_axis(ndarray::Axis(0), 0);
        let total_frames = encoder_out_lens
            .iter()
            .next()
            .map(|&len| len.max(0) as usize)
            .unwrap_or(0)
            .min(encodings.shape()[0]);

        let mut session = DecoderSession::new(self)?;
        let (token_ids, frames) =
            session.decode_sequence(self, &encodings, total_frames, config, on_step)?;

        let tokens = token_ids
            .iter()
            .zip(frames)
            .map(|(&token_id, frame)| TokenWithTime {
                token_id,
                text: self.vocab.token(token_id).unwrap_or_default().to_string(),
                frame,
            })
            .collect();

        log::debug!(
            "Window of {} samples decoded into {} tokens over {} frames in {:?}",
            samples_len,
            token_ids.len(),
            total_frames,
            window_start.elapsed()
        );

        Ok(WindowDecode {
            tokens,
            total_frames,
        })
    }
}
