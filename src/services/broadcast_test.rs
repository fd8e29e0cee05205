use super::*;
use crate::frame::Status;

fn channel() -> (mpsc::Sender<Frame>, mpsc::Receiver<Frame>) {
    mpsc::channel(8)
}

#[test]
fn event_syscalls() {
    let id = Uuid::new_v4();
    assert_eq!(SessionEvent::ParticipantCount { count: 2 }.syscall(), "session:participants");
    assert_eq!(SessionEvent::ParticipantConnected { participant_id: id }.syscall(), "participant:connected");
    assert_eq!(SessionEvent::ConsensusReached { tag_ids: vec![id], finalized: vec![id] }.syscall(), "consensus:reached");
    assert_eq!(SessionEvent::SessionEnded { reason: EndReason::Expired, generation: 1 }.syscall(), "session:ended");
}

#[test]
fn tag_voted_payload_is_camel_case() {
    let tag_id = Uuid::new_v4();
    let data = SessionEvent::TagVoted { tag_id, total_score: -1, votes: Vec::new() }.data();
    assert_eq!(data["tagId"], serde_json::json!(tag_id));
    assert_eq!(data["totalScore"], serde_json::json!(-1));
    assert_eq!(data["votes"], serde_json::json!([]));
}

#[test]
fn to_frame_stamps_session_and_origin() {
    let from = Uuid::new_v4();
    let frame = SessionEvent::SessionCompleted.to_frame("current", Some(from));
    assert_eq!(frame.status, Status::Request);
    assert_eq!(frame.session_id.as_deref(), Some("current"));
    assert_eq!(frame.from, Some(from.to_string()));
    assert!(frame.parent_id.is_none());

    let frame = SessionEvent::SessionEnded { reason: EndReason::Deleted, generation: 3 }.to_frame("current", None);
    assert!(frame.from.is_none());
    assert_eq!(frame.data["reason"], serde_json::json!("deleted"));
    assert_eq!(frame.data["generation"], serde_json::json!(3));
}

#[test]
fn publish_delivers_in_order_to_every_subscriber() {
    let mut hub = Hub::new();
    let (tx_a, mut rx_a) = channel();
    let (tx_b, mut rx_b) = channel();
    hub.subscribe(Uuid::new_v4(), Uuid::new_v4(), tx_a);
    hub.subscribe(Uuid::new_v4(), Uuid::new_v4(), tx_b);

    hub.publish(
        "current",
        None,
        &[SessionEvent::ParticipantCount { count: 3 }, SessionEvent::SessionCompleted],
    );

    for rx in [&mut rx_a, &mut rx_b] {
        assert_eq!(rx.try_recv().unwrap().syscall, "session:participants");
        assert_eq!(rx.try_recv().unwrap().syscall, "session:completed");
        assert!(rx.try_recv().is_err());
    }
}

#[test]
fn full_queue_drops_without_blocking_others() {
    let mut hub = Hub::new();
    let (slow_tx, mut slow_rx) = mpsc::channel(1);
    let (fast_tx, mut fast_rx) = channel();
    hub.subscribe(Uuid::new_v4(), Uuid::new_v4(), slow_tx);
    hub.subscribe(Uuid::new_v4(), Uuid::new_v4(), fast_tx);

    let events = [SessionEvent::ParticipantCount { count: 1 }, SessionEvent::ParticipantCount { count: 2 }];
    hub.publish("current", None, &events);

    assert_eq!(slow_rx.try_recv().unwrap().data["count"], serde_json::json!(1));
    assert!(slow_rx.try_recv().is_err());
    assert_eq!(fast_rx.try_recv().unwrap().data["count"], serde_json::json!(1));
    assert_eq!(fast_rx.try_recv().unwrap().data["count"], serde_json::json!(2));
}

#[test]
fn subscribe_replaces_same_connection() {
    let mut hub = Hub::new();
    let connection = Uuid::new_v4();
    let first = Uuid::new_v4();
    let (tx, _rx) = channel();
    assert!(hub.subscribe(connection, first, tx.clone()).is_none());
    let replaced = hub.subscribe(connection, Uuid::new_v4(), tx).unwrap();
    assert_eq!(replaced.participant_id, first);
    assert_eq!(hub.len(), 1);
}

#[test]
fn unsubscribe_and_teardown() {
    let mut hub = Hub::new();
    let connection = Uuid::new_v4();
    let (tx, mut rx) = channel();
    hub.subscribe(connection, Uuid::new_v4(), tx.clone());
    hub.subscribe(Uuid::new_v4(), Uuid::new_v4(), tx);

    assert!(hub.unsubscribe(connection).is_some());
    assert!(hub.unsubscribe(connection).is_none());
    assert_eq!(hub.teardown(), 1);
    assert!(hub.is_empty());

    // All senders gone: the receiver sees the channel close.
    assert!(matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
}
