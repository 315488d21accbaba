use crate::asr::recognizer::{AsrError, AsrModel, InferenceConfig};

pub(crate) mod search;
pub(crate) mod session;
pub(crate) mod state;

pub use search::StepObserver;
pub use session::DecoderSession;
pub use state::*;

use search::{Alignment, FrameSearch};

impl DecoderSession {
    /// Decodes one window's encoder frames, greedily or with a beam depending
    /// on `config.beam_width`.
    pub(crate) fn decode_sequence(
        &mut self,
        model: &mut AsrModel,
        encodings: &ndarray::ArrayViewD<f32>,
        encodings_len: usize,
        config: &InferenceConfig,
        on_step: &mut StepObserver<'_>,
    ) -> Result<Alignment, AsrError> {
        let width = config.beam_width.max(1);
        let search = FrameSearch {
            session: self,
            model,
            config,
        };
        if width == 1 {
            log::trace!("Greedy search over {encodings_len} frames");
            search.greedy(encodings, encodings_len, on_step)
        } else {
            log::trace!("Beam search (width {width}) over {encodings_len} frames");
            search.beam(encodings, encodings_len, width, on_step)
        }
    }
}
