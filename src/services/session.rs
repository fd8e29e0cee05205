//! Session store — the single authoritative planning session.
//!
//! ARCHITECTURE
//! ============
//! `SessionStore` is the only mutation surface for sessions, participants,
//! tags, and votes. It holds at most one live session. Every public method
//! takes one process-wide mutex for its whole duration (reads included), so
//! no caller ever observes a half-applied change.
//!
//! DESIGN
//! ======
//! - Internal maps are keyed by id; the wire snapshot is list-shaped and
//!   produced by an explicit projection (`Session::snapshot`).
//! - Events are published to the broadcast hub before the lock is released,
//!   which is what gives each connection commit-ordered delivery.
//! - Nothing here awaits. Category classification and any other slow work
//!   happens in the gateway before a store method is called.
//! - Expiry is checked lazily on every entry point as well as by the
//!   lifecycle timer, so an expired session is absent even if no timer fired.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, ErrorCode, Frame};
use crate::services::broadcast::{EndReason, Hub, SessionEvent};
use crate::services::consensus::{self, Evaluation};
use crate::services::identity::{self, IdentityError};
use crate::services::lifecycle::ExpiryTimer;
use crate::services::tag::{self, Category, TagError};

pub const DEFAULT_SESSION_ID: &str = "current";
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_MAX_PARTICIPANTS: usize = 20;

// =============================================================================
// CONFIG
// =============================================================================

/// Store construction parameters.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Id assigned to every created session.
    pub session_id: String,
    /// Lifetime of a session from creation.
    pub ttl: Duration,
    /// Soft cap; exceeding it only logs.
    pub max_participants: usize,
    /// Categories `add_tag` accepts.
    pub categories: Vec<Category>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            session_id: DEFAULT_SESSION_ID.to_owned(),
            ttl: DEFAULT_SESSION_TTL,
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            categories: Category::ALL.to_vec(),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Expired,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("{message}")]
    Validation { field: &'static str, message: String, suggestion: Option<String> },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("session is {0}")]
    Inactive(SessionStatus),
    #[error("name already taken: {0}")]
    NameConflict(String),
    #[error("only the session admin may {0}")]
    Forbidden(&'static str),
    #[error("session is full")]
    SessionFull,
}

impl SessionError {
    fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { field, message: message.into(), suggestion: None }
    }
}

impl From<TagError> for SessionError {
    fn from(err: TagError) -> Self {
        Self::Validation {
            field: err.field(),
            message: err.to_string(),
            suggestion: err.suggestion().map(str::to_owned),
        }
    }
}

impl From<IdentityError> for SessionError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::CodeSpaceExhausted => Self::SessionFull,
            other => Self::validation("name", other.to_string()),
        }
    }
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "E_VALIDATION",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Inactive(_) => "E_SESSION_INACTIVE",
            Self::NameConflict(_) => "E_NAME_CONFLICT",
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::SessionFull => "E_SESSION_FULL",
        }
    }

    fn details(&self) -> Data {
        let mut data = Data::new();
        if let Self::Validation { field, suggestion, .. } = self {
            data.insert("field".into(), serde_json::json!(field));
            if let Some(suggestion) = suggestion {
                data.insert("suggestion".into(), serde_json::json!(suggestion));
            }
        }
        data
    }
}

// =============================================================================
// MODEL
// =============================================================================

#[derive(Debug, Clone)]
pub struct Participant {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub joined_at: OffsetDateTime,
    pub is_creator: bool,
    pub is_admin: bool,
    /// Live websocket connection, if any. Not part of identity.
    pub connection: Option<Uuid>,
    seq: u64,
}

#[derive(Debug, Clone)]
pub struct Vote {
    pub participant_id: Uuid,
    /// `1` or `-1`.
    pub value: i8,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct Tag {
    pub id: Uuid,
    /// Normalized text; also the dedup key.
    pub text: String,
    pub category: Category,
    pub votes: HashMap<Uuid, Vote>,
    pub total_score: i64,
    pub added_by: Uuid,
    pub created_at: OffsetDateTime,
    seq: u64,
}

impl Tag {
    /// Insert or overwrite one participant's vote and recompute the score.
    fn upsert_vote(&mut self, participant_id: Uuid, value: i8, now: OffsetDateTime) {
        self.votes
            .insert(participant_id, Vote { participant_id, value, updated_at: now });
        self.total_score = self.votes.values().map(|v| i64::from(v.value)).sum();
    }
}

/// Tag ids by consensus state. Every tag id is in exactly one list.
#[derive(Debug, Clone, Default)]
pub struct Consensus {
    pub finalized: Vec<Uuid>,
    pub pending: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub description: String,
    pub creator_id: Uuid,
    pub admin_id: Uuid,
    pub status: SessionStatus,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub participants: HashMap<Uuid, Participant>,
    pub tags: HashMap<Uuid, Tag>,
    pub consensus: Consensus,
    next_seq: u64,
}

impl Session {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    fn participant_codes(&self) -> HashSet<String> {
        self.participants
            .values()
            .map(|p| p.code.clone())
            .collect()
    }

    fn find_tag_by_text(&self, text: &str) -> Option<Uuid> {
        self.tags
            .values()
            .find(|t| t.text == text)
            .map(|t| t.id)
    }

    fn require_participant(&self, participant_id: Uuid) -> Result<&Participant, SessionError> {
        self.participants
            .get(&participant_id)
            .ok_or(SessionError::NotFound("participant"))
    }

    fn require_active(&self) -> Result<(), SessionError> {
        if self.status == SessionStatus::Active {
            Ok(())
        } else {
            Err(SessionError::Inactive(self.status.clone()))
        }
    }

    /// Record a vote and run consensus. Returns the evaluation outcome.
    fn apply_vote(&mut self, tag_id: Uuid, participant_id: Uuid, value: i8, now: OffsetDateTime) -> Evaluation {
        let participant_count = self.participants.len();
        let already_finalized = self.consensus.finalized.contains(&tag_id);
        let Some(tag) = self.tags.get_mut(&tag_id) else {
            return Evaluation::Unchanged;
        };
        tag.upsert_vote(participant_id, value, now);

        let evaluation = consensus::evaluate(tag.votes.values(), participant_count, already_finalized);
        if evaluation == Evaluation::Finalized {
            self.consensus.pending.retain(|id| *id != tag_id);
            self.consensus.finalized.push(tag_id);
        }
        evaluation
    }

    /// Project the aggregate into its list-shaped wire form.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let mut participants: Vec<&Participant> = self.participants.values().collect();
        participants.sort_by_key(|p| p.seq);
        let mut tags: Vec<&Tag> = self.tags.values().collect();
        tags.sort_by_key(|t| t.seq);

        SessionSnapshot {
            id: self.id.clone(),
            description: self.description.clone(),
            status: self.status.clone(),
            created_at: format_ts(self.created_at),
            expires_at: format_ts(self.expires_at),
            participants: participants
                .into_iter()
                .map(ParticipantSnapshot::from)
                .collect(),
            keywords: tags.into_iter().map(TagSnapshot::from).collect(),
            consensus: ConsensusSnapshot {
                finalized: self.consensus.finalized.clone(),
                pending: self.consensus.pending.clone(),
            },
        }
    }
}

#[cfg(test)]
impl Session {
    /// Bare active session holding one participant per name, the first as
    /// creator.
    pub(crate) fn with_participants(names: &[&str]) -> Self {
        let now = OffsetDateTime::now_utc();
        let mut session = Self {
            id: DEFAULT_SESSION_ID.to_owned(),
            description: String::new(),
            creator_id: Uuid::nil(),
            admin_id: Uuid::nil(),
            status: SessionStatus::Active,
            created_at: now,
            expires_at: now + DEFAULT_SESSION_TTL,
            participants: HashMap::new(),
            tags: HashMap::new(),
            consensus: Consensus::default(),
            next_seq: 0,
        };
        for (i, name) in names.iter().enumerate() {
            let id = Uuid::new_v4();
            let seq = session.next_seq();
            if i == 0 {
                session.creator_id = id;
                session.admin_id = id;
            }
            session.participants.insert(
                id,
                Participant {
                    id,
                    name: (*name).to_owned(),
                    code: (100 + seq).to_string(),
                    joined_at: now,
                    is_creator: i == 0,
                    is_admin: i == 0,
                    connection: None,
                    seq,
                },
            );
        }
        session
    }
}

/// RFC 3339 timestamp text.
pub(crate) fn format_ts(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339)
        .unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

// =============================================================================
// SNAPSHOT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub description: String,
    pub status: SessionStatus,
    pub created_at: String,
    pub expires_at: String,
    pub participants: Vec<ParticipantSnapshot>,
    pub keywords: Vec<TagSnapshot>,
    pub consensus: ConsensusSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSnapshot {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub joined_at: String,
    pub is_creator: bool,
    pub is_admin: bool,
}

impl From<&Participant> for ParticipantSnapshot {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            code: p.code.clone(),
            joined_at: format_ts(p.joined_at),
            is_creator: p.is_creator,
            is_admin: p.is_admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSnapshot {
    pub participant_id: Uuid,
    pub value: i8,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagSnapshot {
    pub id: Uuid,
    pub text: String,
    pub category: Category,
    pub votes: Vec<VoteSnapshot>,
    pub total_score: i64,
    pub added_by: Uuid,
    pub created_at: String,
}

fn vote_list(tag: &Tag) -> Vec<VoteSnapshot> {
    let mut votes: Vec<&Vote> = tag.votes.values().collect();
    votes.sort_by_key(|v| (v.updated_at, v.participant_id));
    votes
        .into_iter()
        .map(|v| VoteSnapshot {
            participant_id: v.participant_id,
            value: v.value,
            timestamp: format_ts(v.updated_at),
        })
        .collect()
}

impl From<&Tag> for TagSnapshot {
    fn from(t: &Tag) -> Self {
        Self {
            id: t.id,
            text: t.text.clone(),
            category: t.category,
            votes: vote_list(t),
            total_score: t.total_score,
            added_by: t.added_by,
            created_at: format_ts(t.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsensusSnapshot {
    pub finalized: Vec<Uuid>,
    pub pending: Vec<Uuid>,
}

// =============================================================================
// OPERATION RESULTS
// =============================================================================

#[derive(Debug, Clone)]
pub struct Created {
    pub session_id: String,
    pub participant_id: Uuid,
    pub participant_code: String,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Clone)]
pub struct Joined {
    pub participant_id: Uuid,
    pub participant_code: String,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Clone)]
pub struct Rejoined {
    pub participant_id: Uuid,
    pub participant_code: String,
    pub name: String,
    pub is_creator: bool,
    pub is_admin: bool,
    pub snapshot: SessionSnapshot,
}

/// A connection's subscription: the snapshot it starts from and the session
/// incarnation it belongs to.
#[derive(Debug, Clone)]
pub struct Attached {
    pub generation: u64,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Clone)]
pub struct TagAdded {
    pub tag: TagSnapshot,
    pub was_newly_created: bool,
    /// Whether this call moved the tag into `finalized`.
    pub finalized: bool,
}

#[derive(Debug, Clone)]
pub struct VoteOutcome {
    pub tag_id: Uuid,
    pub total_score: i64,
    pub votes: Vec<VoteSnapshot>,
    pub finalized: bool,
}

// =============================================================================
// STORE
// =============================================================================

/// Cheap-to-clone handle to the one session store of the process.
#[derive(Clone)]
pub struct SessionStore {
    shared: Arc<Shared>,
}

struct Shared {
    config: StoreConfig,
    inner: Mutex<Inner>,
}

struct Inner {
    session: Option<Session>,
    /// Bumped on every create; lets a timer recognise its own session.
    generation: u64,
    hub: Hub,
    timer: ExpiryTimer,
}

/// The live session, if it is the one `session_id` names. Takes the slot
/// rather than `Inner` so the hub stays borrowable alongside it.
fn require_session<'a>(slot: &'a mut Option<Session>, session_id: &str) -> Result<&'a mut Session, SessionError> {
    slot.as_mut()
        .filter(|s| s.id == session_id)
        .ok_or(SessionError::NotFound("session"))
}

impl Inner {
    /// Notify subscribers, tear the group down, and forget the session.
    fn discard(&mut self, reason: EndReason, from: Option<Uuid>) {
        self.timer.cancel();
        let Some(mut session) = self.session.take() else {
            return;
        };
        if reason == EndReason::Expired {
            session.status = SessionStatus::Expired;
        }
        self.hub
            .publish(&session.id, from, &[SessionEvent::SessionEnded { reason, generation: self.generation }]);
        let dropped = self.hub.teardown();
        info!(
            session_id = %session.id,
            creator_id = %session.creator_id,
            status = %session.status,
            reason = reason.as_str(),
            subscribers = dropped,
            "session discarded"
        );
    }

    /// Lazy expiry. Returns true when a session was discarded.
    fn expire_if_due(&mut self, now: OffsetDateTime) -> bool {
        let due = self
            .session
            .as_ref()
            .is_some_and(|s| s.is_expired_at(now));
        if due {
            self.discard(EndReason::Expired, None);
        }
        due
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(Inner { session: None, generation: 0, hub: Hub::new(), timer: ExpiryTimer::new() }),
            }),
        }
    }

    /// Lock the aggregate and apply lazy expiry before handing it out.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        let mut inner = self
            .shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        inner.expire_if_due(OffsetDateTime::now_utc());
        inner
    }

    // -------------------------------------------------------------------------
    // create / join / rejoin / get
    // -------------------------------------------------------------------------

    /// Create the session, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a bad creator name.
    pub fn create_session(&self, description: &str, creator_name: &str) -> Result<Created, SessionError> {
        let name = identity::validate_name(creator_name)?;
        let config = &self.shared.config;

        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.session.is_some() {
            inner.discard(EndReason::Replaced, None);
        }

        let now = OffsetDateTime::now_utc();
        let creator_id = identity::allocate_participant_id();
        let code = identity::allocate_user_code(&HashSet::new())?;

        let mut session = Session {
            id: config.session_id.clone(),
            description: description.trim().to_owned(),
            creator_id,
            admin_id: creator_id,
            status: SessionStatus::Active,
            created_at: now,
            expires_at: now + config.ttl,
            participants: HashMap::new(),
            tags: HashMap::new(),
            consensus: Consensus::default(),
            next_seq: 0,
        };
        let seq = session.next_seq();
        session.participants.insert(
            creator_id,
            Participant {
                id: creator_id,
                name,
                code: code.clone(),
                joined_at: now,
                is_creator: true,
                is_admin: true,
                connection: None,
                seq,
            },
        );

        inner.generation += 1;
        let generation = inner.generation;
        let weak = Arc::downgrade(&self.shared);
        inner.timer.schedule_at(session.expires_at, move || {
            if let Some(shared) = weak.upgrade() {
                SessionStore { shared }.expire_due(Some(generation));
            }
        });

        let snapshot = session.snapshot();
        info!(session_id = %session.id, %creator_id, generation, "session created");
        inner.session = Some(session);

        Ok(Created { session_id: config.session_id.clone(), participant_id: creator_id, participant_code: code, snapshot })
    }

    /// Add a new participant to the active session.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Inactive`, `Validation`, `NameConflict`, or `SessionFull`.
    pub fn join_session(&self, session_id: &str, name: &str) -> Result<Joined, SessionError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let session = require_session(&mut inner.session, session_id)?;
        session.require_active()?;

        let name = identity::validate_name(name)?;
        if identity::is_name_taken(session, &name, None) {
            return Err(SessionError::NameConflict(name));
        }
        let code = identity::allocate_user_code(&session.participant_codes())?;

        let participant_id = identity::allocate_participant_id();
        let seq = session.next_seq();
        let participant = Participant {
            id: participant_id,
            name,
            code: code.clone(),
            joined_at: OffsetDateTime::now_utc(),
            is_creator: false,
            is_admin: false,
            connection: None,
            seq,
        };
        let public = ParticipantSnapshot::from(&participant);
        session.participants.insert(participant_id, participant);

        let count = session.participants.len();
        if count > self.shared.config.max_participants {
            warn!(%session_id, count, cap = self.shared.config.max_participants, "participant soft cap exceeded");
        }
        info!(%session_id, %participant_id, count, "participant joined");

        let snapshot = session.snapshot();
        inner.hub.publish(
            session_id,
            Some(participant_id),
            &[SessionEvent::ParticipantJoined { participant: public }, SessionEvent::ParticipantCount { count }],
        );

        Ok(Joined { participant_id, participant_code: code, snapshot })
    }

    /// Look up an existing identity by its code. Never mutates.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown session or code, `Inactive` for a
    /// session that is no longer active.
    pub fn rejoin_session(&self, session_id: &str, user_code: &str) -> Result<Rejoined, SessionError> {
        let mut guard = self.lock();
        let session = require_session(&mut guard.session, session_id)?;
        session.require_active()?;

        let code = user_code.trim();
        let participant = session
            .participants
            .values()
            .find(|p| p.code == code)
            .ok_or(SessionError::NotFound("participant code"))?;

        info!(%session_id, participant_id = %participant.id, "participant rejoined");
        Ok(Rejoined {
            participant_id: participant.id,
            participant_code: participant.code.clone(),
            name: participant.name.clone(),
            is_creator: participant.is_creator,
            is_admin: participant.is_admin,
            snapshot: session.snapshot(),
        })
    }

    /// Full snapshot of the session.
    ///
    /// # Errors
    ///
    /// `NotFound` if there is no such session (including an expired one).
    pub fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, SessionError> {
        let mut guard = self.lock();
        Ok(require_session(&mut guard.session, session_id)?.snapshot())
    }

    // -------------------------------------------------------------------------
    // tags / votes
    // -------------------------------------------------------------------------

    /// Propose a tag, or endorse the existing tag with the same normalized
    /// text by casting a `+1` on the caller's behalf.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Inactive`, or `Validation` (text or category).
    pub fn add_tag(
        &self,
        session_id: &str,
        participant_id: Uuid,
        raw_text: &str,
        category: Category,
    ) -> Result<TagAdded, SessionError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let session = require_session(&mut inner.session, session_id)?;
        session.require_participant(participant_id)?;
        session.require_active()?;

        if !self.shared.config.categories.contains(&category) {
            return Err(TagError::UnknownCategory(category.to_string()).into());
        }
        let text = tag::canonicalize(raw_text)?;
        let now = OffsetDateTime::now_utc();

        let mut events = Vec::new();
        let result = if let Some(tag_id) = session.find_tag_by_text(&text) {
            let evaluation = session.apply_vote(tag_id, participant_id, 1, now);
            let tag = TagSnapshot::from(&session.tags[&tag_id]);
            events.push(SessionEvent::TagVoted { tag_id, total_score: tag.total_score, votes: tag.votes.clone() });
            let finalized = evaluation == Evaluation::Finalized;
            if finalized {
                info!(%session_id, %tag_id, "consensus reached");
                events.push(SessionEvent::ConsensusReached {
                    tag_ids: vec![tag_id],
                    finalized: session.consensus.finalized.clone(),
                });
            }
            TagAdded { tag, was_newly_created: false, finalized }
        } else {
            let tag_id = Uuid::new_v4();
            let seq = session.next_seq();
            let tag = Tag {
                id: tag_id,
                text,
                category,
                votes: HashMap::new(),
                total_score: 0,
                added_by: participant_id,
                created_at: now,
                seq,
            };
            let snapshot = TagSnapshot::from(&tag);
            session.tags.insert(tag_id, tag);
            session.consensus.pending.push(tag_id);
            info!(%session_id, %tag_id, text = %snapshot.text, category = %category, "tag created");
            events.push(SessionEvent::TagAdded { tag: snapshot.clone() });
            TagAdded { tag: snapshot, was_newly_created: true, finalized: false }
        };

        inner.hub.publish(session_id, Some(participant_id), &events);
        Ok(result)
    }

    /// Cast or flip a vote.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Inactive`, or `Validation` for a value other than ±1.
    pub fn vote(&self, session_id: &str, participant_id: Uuid, tag_id: Uuid, value: i64) -> Result<VoteOutcome, SessionError> {
        let value: i8 = match value {
            1 => 1,
            -1 => -1,
            _ => return Err(SessionError::validation("value", "vote value must be 1 or -1")),
        };

        let mut guard = self.lock();
        let inner = &mut *guard;
        let session = require_session(&mut inner.session, session_id)?;
        session.require_participant(participant_id)?;
        if !session.tags.contains_key(&tag_id) {
            return Err(SessionError::NotFound("tag"));
        }
        session.require_active()?;

        let evaluation = session.apply_vote(tag_id, participant_id, value, OffsetDateTime::now_utc());
        let tag = &session.tags[&tag_id];
        let outcome = VoteOutcome {
            tag_id,
            total_score: tag.total_score,
            votes: vote_list(tag),
            finalized: evaluation == Evaluation::Finalized,
        };

        let mut events = vec![SessionEvent::TagVoted {
            tag_id,
            total_score: outcome.total_score,
            votes: outcome.votes.clone(),
        }];
        if outcome.finalized {
            info!(%session_id, %tag_id, "consensus reached");
            events.push(SessionEvent::ConsensusReached {
                tag_ids: vec![tag_id],
                finalized: session.consensus.finalized.clone(),
            });
        }
        inner.hub.publish(session_id, Some(participant_id), &events);
        Ok(outcome)
    }

    // -------------------------------------------------------------------------
    // admin
    // -------------------------------------------------------------------------

    /// Admin-only: discard the session.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Forbidden`.
    pub fn delete_session(&self, session_id: &str, participant_id: Uuid) -> Result<(), SessionError> {
        let mut guard = self.lock();
        let session = require_session(&mut guard.session, session_id)?;
        if session.admin_id != participant_id {
            return Err(SessionError::Forbidden("delete the session"));
        }
        guard.discard(EndReason::Deleted, Some(participant_id));
        Ok(())
    }

    /// Admin-only: close the session to further changes.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden`, or `Inactive`.
    pub fn complete_session(&self, session_id: &str, participant_id: Uuid) -> Result<SessionSnapshot, SessionError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let session = require_session(&mut inner.session, session_id)?;
        if session.admin_id != participant_id {
            return Err(SessionError::Forbidden("complete the session"));
        }
        session.require_active()?;
        session.status = SessionStatus::Completed;
        let snapshot = session.snapshot();
        info!(%session_id, "session completed");
        inner.hub.publish(session_id, Some(participant_id), &[SessionEvent::SessionCompleted]);
        Ok(snapshot)
    }

    // -------------------------------------------------------------------------
    // connections
    // -------------------------------------------------------------------------

    /// Attach a live connection to a participant and subscribe it. The
    /// returned snapshot and the subscription are taken under one lock, so
    /// the connection misses nothing committed after the snapshot.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown session or participant.
    pub fn attach(
        &self,
        session_id: &str,
        participant_id: Uuid,
        connection_id: Uuid,
        tx: mpsc::Sender<Frame>,
    ) -> Result<Attached, SessionError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let session = require_session(&mut inner.session, session_id)?;
        session.require_participant(participant_id)?;

        let mut events = Vec::new();
        if let Some(previous) = inner.hub.unsubscribe(connection_id) {
            if let Some(p) = session.participants.get_mut(&previous.participant_id) {
                if p.connection == Some(connection_id) {
                    p.connection = None;
                    events.push((previous.participant_id, SessionEvent::ParticipantDisconnected {
                        participant_id: previous.participant_id,
                    }));
                }
            }
        }
        if let Some(p) = session.participants.get_mut(&participant_id) {
            p.connection = Some(connection_id);
        }
        events.push((participant_id, SessionEvent::ParticipantConnected { participant_id }));

        let snapshot = session.snapshot();
        for (from, event) in events {
            inner.hub.publish(session_id, Some(from), &[event]);
        }
        inner.hub.subscribe(connection_id, participant_id, tx);
        info!(%session_id, %participant_id, %connection_id, subscribers = inner.hub.len(), "connection attached");
        Ok(Attached { generation: inner.generation, snapshot })
    }

    /// Forget a closed connection. The participant record stays.
    pub fn detach(&self, connection_id: Uuid) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let Some(subscriber) = inner.hub.unsubscribe(connection_id) else {
            return;
        };
        let Some(session) = inner.session.as_mut() else {
            return;
        };
        let participant_id = subscriber.participant_id;
        let session_id = session.id.clone();
        info!(%session_id, %participant_id, %connection_id, "connection detached");
        // A newer connection for the same participant keeps them online.
        let Some(p) = session
            .participants
            .get_mut(&participant_id)
            .filter(|p| p.connection == Some(connection_id))
        else {
            return;
        };
        p.connection = None;
        inner.hub.publish(
            &session_id,
            Some(participant_id),
            &[SessionEvent::ParticipantDisconnected { participant_id }],
        );
    }

    // -------------------------------------------------------------------------
    // lifecycle
    // -------------------------------------------------------------------------

    /// Discard the session if it has expired. With `generation`, only acts
    /// if the session is still the incarnation that generation names.
    /// Returns true when a session was discarded.
    pub fn expire_due(&self, generation: Option<u64>) -> bool {
        let mut inner = self
            .shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if generation.is_some_and(|g| g != inner.generation) {
            return false;
        }
        inner.expire_if_due(OffsetDateTime::now_utc())
    }

    /// Whether an expiry timer is currently pending.
    #[cfg(test)]
    #[must_use]
    pub fn has_pending_timer(&self) -> bool {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .timer
            .is_scheduled()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
