use crate::streaming::chunks::RawSegment;

#[derive(Debug, Clone, PartialEq)]
pub struct TokenWithTime {
    pub token_id: i32,
    pub text: String,
    /// Encoder frame the token was emitted on, relative to its window.
    pub frame: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordWithTime {
    pub text: String,
    pub start_frame: usize,
    pub end_frame: usize,
}

impl WordWithTime {
    /// Segment spanning the word's frames. A word emitted on a single frame
    /// still spans one frame.
    pub fn to_segment(&self) -> RawSegment {
        RawSegment::new(
            self.text.clone(),
            self.start_frame as u32,
            Some(self.end_frame as u32 + 1),
        )
    }
}

/// Groups sub-word tokens into words. A token starting with a space opens a
/// new word.
pub fn tokens_to_words(tokens: Vec<TokenWithTime>) -> Vec<WordWithTime> {
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut words = Vec::new();
    let mut current_word_tokens = Vec::new();

    for token in tokens {
        let starts_word = token.text.starts_with(' ') || current_word_tokens.is_empty();

        if starts_word && !current_word_tokens.is_empty() {
            if let Some(word) = finalize_word(&current_word_tokens) {
                words.push(word);
            }
            current_word_tokens.clear();
        }

        current_word_tokens.push(token);
    }

    if let Some(word) = finalize_word(&current_word_tokens) {
        words.push(word);
    }

    words
}

fn finalize_word(tokens: &[TokenWithTime]) -> Option<WordWithTime> {
    let first = tokens.first()?;
    let last = tokens.last()?;
    let raw_text = tokens.iter().map(|t| t.text.as_str()).collect::<String>();
    let text = raw_text.trim();
    if text.is_empty() {
        return None;
    }

    Some(WordWithTime {
        text: text.to_string(),
        start_frame: first.frame,
        end_frame: last.frame,
    })
}

/// Turns one window's words into raw segments. When the window is followed by
/// another, a final word that runs into the last `edge_frames` frames may be
/// cut mid-word, so its end is left open.
pub fn words_to_segments(
    words: &[WordWithTime],
    total_frames: usize,
    is_last_window: bool,
    edge_frames: usize,
) -> Vec<RawSegment> {
    let mut segments: Vec<RawSegment> = words.iter().map(WordWithTime::to_segment).collect();

    if !is_last_window {
        if let (Some(word), Some(segment)) = (words.last(), segments.last_mut()) {
            if word.end_frame + edge_frames >= total_frames {
                segment.end = None;
            }
        }
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(id: i32, text: &str, frame: usize) -> TokenWithTime {
        TokenWithTime {
            token_id: id,
            text: text.to_string(),
            frame,
        }
    }

    #[test]
    fn sub_word_tokens_merge() {
        let words = tokens_to_words(vec![
            token(1, " hel", 2),
            token(2, "lo", 3),
            token(3, " world", 7),
        ]);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "hello");
        assert_eq!((words[0].start_frame, words[0].end_frame), (2, 3));
        assert_eq!(words[1].text, "world");
    }

    #[test]
    fn whitespace_only_words_are_skipped() {
        let words = tokens_to_words(vec![token(1, " ", 0), token(2, " ok", 1)]);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "ok");
    }

    #[test]
    fn trailing_word_at_edge_stays_open() {
        let words = tokens_to_words(vec![token(1, " a", 0), token(2, " b", 98)]);
        let open = words_to_segments(&words, 100, false, 2);
        assert_eq!(open[0].end, Some(1));
        assert_eq!(open[1].end, None);

        let closed = words_to_segments(&words, 100, true, 2);
        assert_eq!(closed[1].end, Some(99));
    }
}
