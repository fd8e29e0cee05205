use super::*;

#[test]
fn request_sets_fields() {
    let frame = Frame::request("session:create", Data::new());
    assert_eq!(frame.syscall, "session:create");
    assert_eq!(frame.status, Status::Request);
    assert!(frame.parent_id.is_none());
    assert!(frame.session_id.is_none());
    assert!(frame.ts > 0);
}

#[test]
fn reply_inherits_context() {
    let req = Frame::request("tag:add", Data::new()).with_session_id("current");
    let done = req.done_with(Data::new());

    assert_eq!(done.parent_id, Some(req.id));
    assert_eq!(done.session_id.as_deref(), Some("current"));
    assert_eq!(done.syscall, "tag:add");
    assert_eq!(done.status, Status::Done);
    assert!(done.from.is_none());
}

#[test]
fn prefix_and_op_extraction() {
    let frame = Frame::request("tag:vote", Data::new());
    assert_eq!(frame.prefix(), "tag");
    assert_eq!(frame.op(), "vote");

    let frame = Frame::request("noseparator", Data::new());
    assert_eq!(frame.prefix(), "noseparator");
    assert_eq!(frame.op(), "");
}

#[test]
fn json_round_trip() {
    let original = Frame::request("session:join", Data::new())
        .with_session_id("current")
        .with_from("participant-1")
        .with_data("key", "value");

    let json = serde_json::to_string(&original).expect("serialize");
    let restored: Frame = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(restored.id, original.id);
    assert_eq!(restored.session_id.as_deref(), Some("current"));
    assert_eq!(restored.syscall, "session:join");
    assert_eq!(restored.from.as_deref(), Some("participant-1"));
    assert_eq!(restored.data.get("key").and_then(|v| v.as_str()), Some("value"));
}

#[test]
fn minimal_client_frame_deserializes() {
    let json = format!(
        r#"{{"id":"{}","ts":1,"syscall":"session:get","status":"request"}}"#,
        Uuid::new_v4()
    );
    let frame: Frame = serde_json::from_str(&json).expect("deserialize");
    assert!(frame.data.is_empty());
    assert!(frame.session_id.is_none());
}

#[test]
fn error_from_typed() {
    #[derive(Debug, thiserror::Error)]
    #[error("not found")]
    struct NotFound;

    impl ErrorCode for NotFound {
        fn error_code(&self) -> &'static str {
            "E_NOT_FOUND"
        }
    }

    let req = Frame::request("session:get", Data::new());
    let err = req.error_from(&NotFound);

    assert_eq!(err.status, Status::Error);
    assert_eq!(err.data.get("code").and_then(|v| v.as_str()), Some("E_NOT_FOUND"));
    assert_eq!(err.data.get("message").and_then(|v| v.as_str()), Some("not found"));
    assert_eq!(
        err.data
            .get("retryable")
            .and_then(serde_json::Value::as_bool),
        Some(false)
    );
}

#[test]
fn error_from_merges_details() {
    #[derive(Debug, thiserror::Error)]
    #[error("bad text")]
    struct BadText;

    impl ErrorCode for BadText {
        fn error_code(&self) -> &'static str {
            "E_VALIDATION"
        }

        fn details(&self) -> Data {
            let mut data = Data::new();
            data.insert("suggestion".into(), "coffee-shop".into());
            data
        }
    }

    let err = Frame::request("tag:add", Data::new()).error_from(&BadText);
    assert_eq!(err.data.get("suggestion").and_then(|v| v.as_str()), Some("coffee-shop"));
    assert_eq!(err.data.get("code").and_then(|v| v.as_str()), Some("E_VALIDATION"));
}
