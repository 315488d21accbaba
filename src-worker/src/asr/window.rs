use crate::asr::recognizer::AsrError;
use crate::asr::RunOptions;
use crate::streaming::chunks::Stride;

/// One decode window over the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub stride: Stride,
    pub is_last: bool,
}

impl Window {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.stride.chunk_len
    }
}

/// Splits `input_len` samples into overlapping windows of `chunk_length_s`
/// that advance by the chunk length minus both strides.
pub fn plan_windows(
    input_len: usize,
    sampling_rate: u32,
    options: &RunOptions,
) -> Result<Vec<Window>, AsrError> {
    let sr = sampling_rate as f64;
    let chunk_len = (options.chunk_length_s * sr).round() as usize;
    let stride = (options.stride_length_s * sr).round() as usize;

    if chunk_len == 0 || chunk_len <= 2 * stride {
        return Err(AsrError::InvalidOptions(format!(
            "chunk length {}s must exceed twice the stride length {}s",
            options.chunk_length_s, options.stride_length_s
        )));
    }
    let step = chunk_len - 2 * stride;

    let mut windows = Vec::new();
    let mut start = 0;
    while start < input_len {
        let end = start + chunk_len;
        let is_last = end >= input_len;
        let left = if start == 0 { 0 } else { stride };
        let right = if is_last { 0 } else { stride };
        let len = end.min(input_len) - start;

        if len > left {
            windows.push(Window {
                offset: start,
                stride: Stride {
                    chunk_len: len,
                    left,
                    right,
                },
                is_last,
            });
        }
        if is_last {
            break;
        }
        start += step;
    }

    if let Some(last) = windows.last_mut() {
        last.is_last = true;
        last.stride.right = 0;
    }

    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 16_000;

    #[test]
    fn short_input_is_one_window() {
        let windows = plan_windows(12 * SR as usize, SR, &RunOptions::default()).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(
            windows[0].stride,
            Stride {
                chunk_len: 12 * SR as usize,
                left: 0,
                right: 0
            }
        );
        assert!(windows[0].is_last);
    }

    #[test]
    fn long_input_windows_overlap_by_strides() {
        let sr = SR as usize;
        let windows = plan_windows(65 * sr, SR, &RunOptions::default()).unwrap();
        let offsets: Vec<_> = windows.iter().map(|w| w.offset / sr).collect();
        assert_eq!(offsets, vec![0, 20, 40]);
        assert_eq!(windows[0].stride.left, 0);
        assert_eq!(windows[1].stride.left, 5 * sr);
        assert_eq!(windows[1].stride.right, 5 * sr);
        assert_eq!(windows[2].stride.chunk_len, 25 * sr);
        assert!(windows[2].is_last);
    }

    #[test]
    fn empty_input_has_no_windows() {
        assert!(plan_windows(0, SR, &RunOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn stride_too_large_is_rejected() {
        let options = RunOptions {
            chunk_length_s: 10.0,
            stride_length_s: 5.0,
            ..Default::default()
        };
        assert!(matches!(
            plan_windows(SR as usize, SR, &options),
            Err(AsrError::InvalidOptions(_))
        ));
    }
}
