use ndarray::{s, ArrayView1, ArrayViewD};

use crate::asr::recognizer::{AsrError, AsrModel, InferenceConfig};
use crate::asr::Beam;

use super::session::DecoderSession;
use super::state::{Hypothesis, StepScores};

/// Receives the current beams, best first, after each decoding step.
pub type StepObserver<'a> = dyn FnMut(Vec<Beam>) + 'a;

/// Token ids of the winning path and the encoder frame each was emitted on.
pub(crate) type Alignment = (Vec<i32>, Vec<usize>);

/// Frame-synchronous search over one window of encoder output.
pub(crate) struct FrameSearch<'a> {
    pub(crate) session: &'a mut DecoderSession,
    pub(crate) model: &'a mut AsrModel,
    pub(crate) config: &'a InferenceConfig,
}

impl FrameSearch<'_> {
    fn symbols_per_frame(&self) -> usize {
        self.config.max_tokens_per_step.max(1)
    }

    fn start(&self, capacity: usize) -> Hypothesis {
        Hypothesis {
            tokens: Vec::with_capacity(capacity),
            frames: Vec::with_capacity(capacity),
            score: 0.0,
            state: self.session.workspace.state.clone(),
            last_token: self.session.last_token,
        }
    }

    fn score(
        &mut self,
        frame: &ArrayView1<f32>,
        hyp: &Hypothesis,
        width: usize,
    ) -> Result<StepScores, AsrError> {
        self.session
            .step_scores(self.model, frame, hyp.last_token, &hyp.state, self.config, width)
    }

    /// Carries the winner's decoder state into the next window.
    fn finish(self, best: Hypothesis) -> Alignment {
        self.session.workspace.state = best.state;
        self.session.last_token = best.last_token;
        (best.tokens, best.frames)
    }

    pub(crate) fn greedy(
        mut self,
        encodings: &ArrayViewD<f32>,
        frames: usize,
        on_step: &mut StepObserver<'_>,
    ) -> Result<Alignment, AsrError> {
        let mut hyp = self.start(frames / 2);

        for t in 0..frames {
            let frame = encodings.slice(s![t, ..]);
            for _ in 0..self.symbols_per_frame() {
                let scores = self.score(&frame, &hyp, 1)?;
                let Some(&(token, token_score)) = scores
                    .top_tokens
                    .first()
                    .filter(|(_, sc)| *sc > scores.blank_score)
                else {
                    break;
                };
                hyp.extend(token as i32, t, token_score, scores.output_state);
                on_step(vec![hyp.to_beam()]);
            }
        }
        Ok(self.finish(hyp))
    }

    pub(crate) fn beam(
        mut self,
        encodings: &ArrayViewD<f32>,
        frames: usize,
        width: usize,
        on_step: &mut StepObserver<'_>,
    ) -> Result<Alignment, AsrError> {
        let mut beam = vec![self.start(frames / 2)];

        for t in 0..frames {
            let frame = encodings.slice(s![t, ..]);
            let mut settled = Vec::new();
            let mut active = beam;

            for _ in 0..self.symbols_per_frame() {
                if active.is_empty() {
                    break;
                }
                let mut expanded = Vec::new();
                for hyp in &active {
                    let scores = self.score(&frame, hyp, width)?;

                    let mut stay = hyp.clone();
                    stay.score += scores.blank_score;
                    settled.push(stay);

                    for &(token, token_score) in &scores.top_tokens {
                        let mut next = hyp.clone();
                        next.extend(token as i32, t, token_score, scores.output_state.clone());
                        expanded.push(next);
                    }
                }
                active = prune(expanded, width);
            }

            settled.extend(active);
            beam = prune(settled, width);
            on_step(beam.iter().map(Hypothesis::to_beam).collect());
        }

        // Never empty: the blank path of every hypothesis survives pruning.
        let best = beam.swap_remove(0);
        Ok(self.finish(best))
    }
}

fn prune(mut hyps: Vec<Hypothesis>, width: usize) -> Vec<Hypothesis> {
    hyps.sort_by(|a, b| b.score.total_cmp(&a.score));
    hyps.truncate(width);
    hyps
}
