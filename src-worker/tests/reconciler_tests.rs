mod common;

use std::sync::Arc;

use common::{scripted_segments, whisper_config, NumberTokenizer, SR};
use scribe_worker_lib::asr::Beam;
use scribe_worker_lib::protocol::{ProcessedChunk, WorkerMessage};
use scribe_worker_lib::streaming::{
    DecodedSpan, GenerationTracker, RawChunk, RawSegment, Stride, TrackerConfig,
};

fn tracker() -> GenerationTracker {
    GenerationTracker::new(
        Arc::new(NumberTokenizer),
        &whisper_config(),
        TrackerConfig::default(),
    )
}

fn window(offset_s: usize, len_s: usize, left_s: usize, right_s: usize) -> RawChunk {
    let is_last = right_s == 0;
    RawChunk {
        offset: offset_s * SR,
        stride: Stride {
            chunk_len: len_s * SR,
            left: left_s * SR,
            right: right_s * SR,
        },
        is_last,
        segments: scripted_segments(offset_s * SR, len_s * SR, is_last),
    }
}

fn sixty_five_seconds() -> Vec<RawChunk> {
    vec![window(0, 30, 0, 5), window(20, 30, 5, 5), window(40, 25, 5, 0)]
}

fn results(message: Option<WorkerMessage>) -> Vec<ProcessedChunk> {
    match message {
        Some(WorkerMessage::Result(update)) => {
            assert!(!update.is_done);
            update.results
        }
        other => panic!("expected a result update, got {other:?}"),
    }
}

#[test]
fn results_are_sorted_and_well_formed() {
    let mut tracker = tracker();
    for chunk in sixty_five_seconds() {
        let chunks = results(tracker.on_chunk_boundary(chunk));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert!(chunk.start <= chunk.end, "{chunk:?}");
        }
        assert!(chunks.windows(2).all(|w| w[0].start <= w[1].start));
    }

    let texts: Vec<_> = tracker
        .processed_chunks()
        .iter()
        .map(|c| c.text.clone())
        .collect();
    let expected: Vec<_> = (0..65).map(|k| format!("w{k}")).collect();
    assert_eq!(texts, expected);
    assert_eq!(tracker.completed_until(), 65);
}

#[test]
fn misaligned_and_out_of_order_windows_stay_sorted() {
    let mut tracker = tracker();
    let history = vec![
        window(0, 30, 0, 5),
        // No left stride: overlaps audio the first window already owns.
        window(10, 30, 0, 5),
        window(50, 15, 5, 0),
        // Arrives after a later window.
        window(30, 30, 5, 5),
    ];

    for chunk in history {
        let chunks = results(tracker.on_chunk_boundary(chunk));
        for chunk in &chunks {
            assert!(chunk.start <= chunk.end, "{chunk:?}");
        }
        assert!(
            chunks.windows(2).all(|w| w[0].start <= w[1].start),
            "unsorted {:?}",
            chunks.iter().map(|c| c.start).collect::<Vec<_>>()
        );
        let mut texts: Vec<_> = chunks.iter().map(|c| c.text.clone()).collect();
        texts.dedup();
        assert_eq!(texts.len(), chunks.len(), "duplicate words in {chunks:?}");
    }
}

#[test]
fn reconciliation_is_idempotent() {
    let mut first = tracker();
    let mut second = tracker();
    let mut last = (Vec::new(), Vec::new());
    for chunk in sixty_five_seconds() {
        last.0 = results(first.on_chunk_boundary(chunk.clone()));
        last.1 = results(second.on_chunk_boundary(chunk));
    }
    assert_eq!(last.0, last.1);
}

#[test]
fn watermark_advances_with_each_window() {
    let mut tracker = tracker();
    let marks: Vec<_> = sixty_five_seconds()
        .into_iter()
        .map(|chunk| match tracker.on_chunk_boundary(chunk) {
            Some(WorkerMessage::Result(update)) => update.completed_until,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(marks, vec![30, 50, 65]);
}

#[test]
fn open_end_falls_back_to_stride_share() {
    let tracker = tracker();
    let span = DecodedSpan {
        text: " hello".into(),
        start: 2.3,
        end: None,
    };
    let chunk = tracker.process_span(&span, 0);
    assert_eq!((chunk.start, chunk.end), (2, 7));
}

#[test]
fn fallback_factor_is_tunable() {
    let tracker = GenerationTracker::new(
        Arc::new(NumberTokenizer),
        &whisper_config(),
        TrackerConfig {
            end_fallback_factor: 0.5,
            ..TrackerConfig::default()
        },
    );
    let span = DecodedSpan {
        text: "x".into(),
        start: 10.0,
        end: None,
    };
    assert_eq!(tracker.process_span(&span, 3).end, 13);
}

#[test]
fn open_trailing_segment_in_a_live_window_gets_fallback_end() {
    let mut tracker = tracker();
    let chunk = RawChunk {
        offset: 0,
        stride: Stride {
            chunk_len: 30 * SR,
            left: 0,
            right: 5 * SR,
        },
        is_last: false,
        segments: vec![
            RawSegment::new(" done", 0, Some(50)),
            RawSegment::new(" cut", 1400, None),
        ],
    };
    let chunks = results(tracker.on_chunk_boundary(chunk));
    assert_eq!(chunks[1].start, 28);
    assert_eq!(chunks[1].end, 33);
    assert_eq!(tracker.completed_until(), 33);
}

#[test]
fn previews_are_throttled_to_every_tenth_step() {
    let mut tracker = tracker();
    let beams = vec![Beam {
        output_token_ids: vec![0, 7, 9],
        score: -1.0,
    }];
    let previews: Vec<_> = (0..25)
        .filter_map(|_| tracker.on_decode_step(&beams))
        .collect();
    assert_eq!(previews.len(), 2);
    for preview in previews {
        match preview {
            WorkerMessage::PartialResult { result } => {
                assert_eq!(result.text, "t7 t9");
                assert_eq!(result.start, 0);
                assert_eq!(result.end, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[test]
fn preview_starts_at_watermark() {
    let mut tracker = tracker();
    tracker.on_chunk_boundary(window(0, 30, 0, 5));
    let beams = vec![Beam {
        output_token_ids: vec![1],
        score: 0.0,
    }];
    let preview = (0..10).find_map(|_| tracker.on_decode_step(&beams));
    match preview {
        Some(WorkerMessage::PartialResult { result }) => assert_eq!(result.start, 30),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn step_counter_is_per_tracker() {
    let beams = vec![Beam {
        output_token_ids: vec![1],
        score: 0.0,
    }];
    let mut first = tracker();
    for _ in 0..9 {
        assert!(first.on_decode_step(&beams).is_none());
    }
    let mut second = tracker();
    assert!(second.on_decode_step(&beams).is_none());
    assert!(first.on_decode_step(&beams).is_some());
}

#[test]
fn completion_ends_the_session() {
    let mut tracker = tracker();
    assert_eq!(tracker.on_inference_complete(), WorkerMessage::InferenceDone);
    assert!(tracker.on_chunk_boundary(window(0, 12, 0, 0)).is_none());
    assert!(tracker
        .on_decode_step(&[Beam {
            output_token_ids: vec![1],
            score: 0.0
        }])
        .is_none());
}
