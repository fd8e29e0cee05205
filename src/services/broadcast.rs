//! Broadcast hub — fan-out of session events to connected clients.
//!
//! DESIGN
//! ======
//! Each websocket connection that has attached to a participant owns one
//! bounded `mpsc` queue. The hub lives inside the session store's lock and
//! the store publishes while still holding it, so every connection sees
//! events in the order their mutations committed.
//!
//! Delivery is best-effort per subscriber: a full queue drops the frame and
//! logs. A client that suspects a gap asks for a fresh snapshot.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::frame::{Data, Frame};
use crate::services::session::{ParticipantSnapshot, TagSnapshot, VoteSnapshot};

// =============================================================================
// EVENTS
// =============================================================================

/// Why a session went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Deleted,
    Expired,
    Replaced,
}

impl EndReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::Expired => "expired",
            Self::Replaced => "replaced",
        }
    }
}

/// One committed change, shaped for clients to apply as a delta.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ParticipantJoined { participant: ParticipantSnapshot },
    ParticipantCount { count: usize },
    ParticipantConnected { participant_id: Uuid },
    ParticipantDisconnected { participant_id: Uuid },
    TagAdded { tag: TagSnapshot },
    TagVoted { tag_id: Uuid, total_score: i64, votes: Vec<VoteSnapshot> },
    ConsensusReached { tag_ids: Vec<Uuid>, finalized: Vec<Uuid> },
    SessionCompleted,
    /// `generation` names the session incarnation that ended.
    SessionEnded { reason: EndReason, generation: u64 },
}

impl SessionEvent {
    #[must_use]
    pub fn syscall(&self) -> &'static str {
        match self {
            Self::ParticipantJoined { .. } => "participant:joined",
            Self::ParticipantCount { .. } => "session:participants",
            Self::ParticipantConnected { .. } => "participant:connected",
            Self::ParticipantDisconnected { .. } => "participant:disconnected",
            Self::TagAdded { .. } => "tag:added",
            Self::TagVoted { .. } => "tag:voted",
            Self::ConsensusReached { .. } => "consensus:reached",
            Self::SessionCompleted => "session:completed",
            Self::SessionEnded { .. } => "session:ended",
        }
    }

    /// Event payload. Record shapes match the session snapshot.
    #[must_use]
    pub fn data(&self) -> Data {
        let mut data = Data::new();
        match self {
            Self::ParticipantJoined { participant } => {
                data.insert("participant".into(), serde_json::to_value(participant).unwrap_or_default());
            }
            Self::ParticipantCount { count } => {
                data.insert("count".into(), serde_json::json!(count));
            }
            Self::ParticipantConnected { participant_id } | Self::ParticipantDisconnected { participant_id } => {
                data.insert("participantId".into(), serde_json::json!(participant_id));
            }
            Self::TagAdded { tag } => {
                data.insert("tag".into(), serde_json::to_value(tag).unwrap_or_default());
            }
            Self::TagVoted { tag_id, total_score, votes } => {
                data.insert("tagId".into(), serde_json::json!(tag_id));
                data.insert("totalScore".into(), serde_json::json!(total_score));
                data.insert("votes".into(), serde_json::to_value(votes).unwrap_or_default());
            }
            Self::ConsensusReached { tag_ids, finalized } => {
                data.insert("tagIds".into(), serde_json::json!(tag_ids));
                data.insert("finalized".into(), serde_json::json!(finalized));
            }
            Self::SessionCompleted => {
                data.insert("status".into(), serde_json::json!("completed"));
            }
            Self::SessionEnded { reason, generation } => {
                data.insert("reason".into(), serde_json::json!(reason.as_str()));
                data.insert("generation".into(), serde_json::json!(generation));
            }
        }
        data
    }

    /// Wrap the event in a push frame stamped with its originator.
    #[must_use]
    pub fn to_frame(&self, session_id: &str, from: Option<Uuid>) -> Frame {
        let frame = Frame::request(self.syscall(), self.data()).with_session_id(session_id);
        match from {
            Some(participant_id) => frame.with_from(participant_id.to_string()),
            None => frame,
        }
    }
}

// =============================================================================
// HUB
// =============================================================================

/// A connection subscribed to the session group.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub participant_id: Uuid,
    pub tx: mpsc::Sender<Frame>,
}

/// Subscribers keyed by connection id.
#[derive(Debug, Default)]
pub struct Hub {
    subscribers: HashMap<Uuid, Subscriber>,
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection. Returns the subscriber it replaced, if any.
    pub fn subscribe(&mut self, connection_id: Uuid, participant_id: Uuid, tx: mpsc::Sender<Frame>) -> Option<Subscriber> {
        self.subscribers
            .insert(connection_id, Subscriber { participant_id, tx })
    }

    pub fn unsubscribe(&mut self, connection_id: Uuid) -> Option<Subscriber> {
        self.subscribers.remove(&connection_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Push events, in order, to every subscriber.
    pub fn publish(&self, session_id: &str, from: Option<Uuid>, events: &[SessionEvent]) {
        if self.is_empty() {
            return;
        }
        for event in events {
            let frame = event.to_frame(session_id, from);
            for (connection_id, subscriber) in &self.subscribers {
                if let Err(e) = subscriber.tx.try_send(frame.clone()) {
                    warn!(%connection_id, syscall = %frame.syscall, error = %e, "broadcast: dropped frame");
                }
            }
        }
    }

    /// Drop every subscriber. Used after a terminal `session:ended`.
    pub fn teardown(&mut self) -> usize {
        let count = self.subscribers.len();
        self.subscribers.clear();
        count
    }
}

#[cfg(test)]
#[path = "broadcast_test.rs"]
mod tests;
