use scribe_worker_lib::protocol::{
    Envelope, HostMessage, LoadingStatus, PartialTranscript, ProcessedChunk, ProgressEvent,
    SessionId, TranscriptUpdate, WorkerMessage,
};
use serde_json::json;

#[test]
fn inference_request_wire_format() {
    let request = HostMessage::InferenceRequest {
        session: SessionId(7),
        audio: vec![0.0, 0.5],
        model_id: "whisper-tiny.en".into(),
    };
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({
            "type": "inference_request",
            "session": 7,
            "audio": [0.0, 0.5],
            "model_id": "whisper-tiny.en",
        })
    );
}

#[test]
fn unknown_host_kind_decodes_to_unknown() {
    let msg: HostMessage = serde_json::from_str(r#"{"type":"cancel","session":1}"#).unwrap();
    assert_eq!(msg, HostMessage::Unknown);
    assert_eq!(msg.kind(), "unknown");
}

#[test]
fn unknown_worker_kind_decodes_inside_envelope() {
    let env: Envelope = serde_json::from_str(r#"{"session":2,"type":"telemetry"}"#).unwrap();
    assert_eq!(env.session, SessionId(2));
    assert_eq!(env.message, WorkerMessage::Unknown);
}

#[test]
fn downloading_fields_are_flat() {
    let env = Envelope::new(
        SessionId(1),
        WorkerMessage::Downloading(ProgressEvent::new("vocab.txt", 25, 100)),
    );
    assert_eq!(
        serde_json::to_value(&env).unwrap(),
        json!({
            "session": 1,
            "type": "downloading",
            "file": "vocab.txt",
            "progress": 0.25,
            "loaded": 25,
            "total": 100,
        })
    );
}

#[test]
fn loading_status_is_snake_case() {
    let msg = WorkerMessage::loading(LoadingStatus::Success);
    assert_eq!(
        serde_json::to_value(&msg).unwrap(),
        json!({"type": "loading", "status": "success"})
    );

    let failed: WorkerMessage =
        serde_json::from_str(r#"{"type":"loading","status":"error","message":"no weights"}"#)
            .unwrap();
    assert!(failed.is_terminal());
}

#[test]
fn result_update_round_trips_through_envelope() {
    let env = Envelope::new(
        SessionId(9),
        WorkerMessage::Result(TranscriptUpdate {
            results: vec![ProcessedChunk {
                index: 0,
                text: "hello".into(),
                start: 0,
                end: 2,
            }],
            is_done: false,
            completed_until: 2,
        }),
    );
    let line = serde_json::to_string(&env).unwrap();
    assert!(line.contains(r#""type":"result""#));
    assert_eq!(serde_json::from_str::<Envelope>(&line).unwrap(), env);
}

#[test]
fn partial_result_accepts_missing_end() {
    let msg: WorkerMessage = serde_json::from_str(
        r#"{"type":"partial_result","result":{"text":"hel","start":4}}"#,
    )
    .unwrap();
    assert_eq!(
        msg,
        WorkerMessage::PartialResult {
            result: PartialTranscript {
                text: "hel".into(),
                start: 4,
                end: None,
            }
        }
    );
}

#[test]
fn session_ids_advance() {
    let first = SessionId(0);
    assert_eq!(first.next(), SessionId(1));
    assert_eq!(first.next().to_string(), "#1");
}
