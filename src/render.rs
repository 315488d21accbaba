use scribe_worker_lib::protocol::{ProcessedChunk, ProgressEvent};
use serde::Serialize;

/// `mm:ss`, or `h:mm:ss` past the hour.
pub fn format_timestamp(secs: u32) -> String {
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

pub fn format_chunk(chunk: &ProcessedChunk) -> String {
    format!(
        "[{} → {}] {}",
        format_timestamp(chunk.start),
        format_timestamp(chunk.end),
        chunk.text
    )
}

pub fn format_progress(event: &ProgressEvent) -> String {
    if event.total > 0 {
        format!(
            "Downloading {} ({:.0}%, {:.1}/{:.1} MB)",
            event.file,
            event.progress * 100.0,
            event.loaded as f64 / 1e6,
            event.total as f64 / 1e6
        )
    } else {
        format!(
            "Downloading {} ({:.1} MB)",
            event.file,
            event.loaded as f64 / 1e6
        )
    }
}

pub fn format_transcript(chunks: &[ProcessedChunk]) -> String {
    chunks
        .iter()
        .map(format_chunk)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Serialize)]
struct TranscriptJson<'a> {
    model_id: &'a str,
    duration: u32,
    text: String,
    chunks: &'a [ProcessedChunk],
}

pub fn transcript_json(
    model_id: &str,
    chunks: &[ProcessedChunk],
    duration: u32,
) -> Result<String, serde_json::Error> {
    let text = chunks
        .iter()
        .map(|c| c.text.as_str())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    serde_json::to_string_pretty(&TranscriptJson {
        model_id,
        duration,
        text,
        chunks,
    })
}
