//! Audio file decoding for the host, and the sample contract the worker
//! enforces on every request.

use std::path::Path;
use std::time::Instant;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::asr::recognizer::AsrError;

pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Mono PCM at the rate the file was recorded in.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decodes `path` and down-mixes it to mono without changing its rate.
pub fn decode_file(path: &Path) -> Result<DecodedAudio, AsrError> {
    let src = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AsrError::Audio(format!("failed to probe {}: {e}", path.display())))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| AsrError::Audio(format!("no audio track in {}", path.display())))?;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AsrError::Audio(format!("decoder init failed: {e}")))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut samples = Vec::new();

    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(err)) => {
                log::warn!("Skipping corrupt packet in {}: {err}", path.display());
                continue;
            }
            Err(err) => {
                return Err(AsrError::Audio(format!(
                    "decode error for {}: {err}",
                    path.display()
                )))
            }
        };

        let spec = *decoded.spec();
        sample_rate = sample_rate.or(Some(spec.rate));
        let channels = spec.channels.count().max(1);
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);

        if channels == 1 {
            samples.extend_from_slice(buf.samples());
        } else {
            samples.extend(
                buf.samples()
                    .chunks_exact(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }
    }

    let sample_rate = sample_rate
        .ok_or_else(|| AsrError::Audio(format!("missing sample rate for {}", path.display())))?;

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Decodes `path` into mono samples at [`TARGET_SAMPLE_RATE`].
pub fn load_audio(path: &Path) -> Result<Vec<f32>, AsrError> {
    let start = Instant::now();
    let decoded = decode_file(path)?;
    let source_rate = decoded.sample_rate;

    let samples = if source_rate == TARGET_SAMPLE_RATE {
        decoded.samples
    } else {
        log::info!("Resampling {} from {source_rate} Hz", path.display());
        resample_linear(&decoded.samples, source_rate, TARGET_SAMPLE_RATE)
    };

    log::info!(
        "Loaded {} samples from {} in {:?}",
        samples.len(),
        path.display(),
        start.elapsed()
    );
    Ok(samples)
}

/// Rejects audio the worker will not run: empty buffers and non-finite
/// samples. The worker never resamples.
pub fn validate_samples(samples: &[f32]) -> Result<(), AsrError> {
    if samples.is_empty() {
        return Err(AsrError::Audio("audio buffer is empty".to_string()));
    }
    if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
        return Err(AsrError::Audio(format!(
            "audio contains a non-finite sample at index {pos}"
        )));
    }
    Ok(())
}

pub fn resample_linear(input: &[f32], from_sr: u32, to_sr: u32) -> Vec<f32> {
    if from_sr == 0 || to_sr == 0 || input.is_empty() {
        return Vec::new();
    }

    let out_len = ((input.len() as f64) * (to_sr as f64) / (from_sr as f64))
        .ceil()
        .max(1.0) as usize;
    let step = from_sr as f64 / to_sr as f64;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let current = input.get(idx).copied().unwrap_or_default();
            let next = input.get(idx + 1).copied().unwrap_or(current);
            current + (next - current) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_degenerate_inputs() {
        assert!(resample_linear(&[], 44_100, 16_000).is_empty());
        assert!(resample_linear(&[1.0, 2.0], 0, 16_000).is_empty());
        assert!(resample_linear(&[1.0, 2.0], 44_100, 0).is_empty());
    }

    #[test]
    fn resample_identity_keeps_samples() {
        let input = [0.1, -0.2, 0.3, -0.4];
        assert_eq!(resample_linear(&input, 16_000, 16_000), input.to_vec());
    }

    #[test]
    fn resample_changes_length_by_ratio() {
        assert_eq!(resample_linear(&[0.0, 0.5, 1.0, 0.5], 32_000, 16_000).len(), 2);
        let up = resample_linear(&[0.0, 1.0], 8_000, 16_000);
        assert_eq!(up.len(), 4);
        assert!(up.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn validation_rejects_empty_and_non_finite() {
        assert!(validate_samples(&[]).is_err());
        assert!(validate_samples(&[0.0, f32::NAN]).is_err());
        assert!(validate_samples(&[0.0, f32::INFINITY]).is_err());
        assert!(validate_samples(&[0.0, 0.5, -0.5]).is_ok());
    }

    #[test]
    fn duration_uses_native_rate() {
        let audio = DecodedAudio {
            samples: vec![0.0; 48_000],
            sample_rate: 48_000,
        };
        assert!((audio.duration_secs() - 1.0).abs() < 1e-9);
    }
}
