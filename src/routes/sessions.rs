//! Session REST routes.
//!
//! The same commands the websocket gateway accepts, as plain JSON over HTTP
//! for clients that poll or script. Bodies and replies use camelCase.
//! Errors reply with a JSON body carrying the grepable code, plus `field`
//! and `suggestion` for validation failures.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::classify::ClassifyError;
use crate::frame::{Data, ErrorCode, FRAME_CODE, FRAME_MESSAGE, FRAME_RETRYABLE};
use crate::services::session::{SessionError, SessionSnapshot, TagSnapshot, VoteSnapshot};
use crate::services::tag::Category;
use crate::state::AppState;

// =============================================================================
// ERRORS
// =============================================================================

pub(crate) fn session_error_to_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::Validation { .. } => StatusCode::BAD_REQUEST,
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        SessionError::Inactive(_) => StatusCode::GONE,
        SessionError::NameConflict(_) => StatusCode::CONFLICT,
        SessionError::Forbidden(_) => StatusCode::FORBIDDEN,
        SessionError::SessionFull => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[derive(Debug)]
pub enum ApiError {
    Session(SessionError),
    Classify(ClassifyError),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

impl From<ClassifyError> for ApiError {
    fn from(err: ClassifyError) -> Self {
        Self::Classify(err)
    }
}

/// Same keys an error frame carries.
pub(crate) fn error_body(err: &(impl ErrorCode + ?Sized)) -> Data {
    let mut data = err.details();
    data.insert(FRAME_CODE.into(), serde_json::json!(err.error_code()));
    data.insert(FRAME_MESSAGE.into(), serde_json::json!(err.to_string()));
    data.insert(FRAME_RETRYABLE.into(), serde_json::json!(err.retryable()));
    data
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Session(e) => (session_error_to_status(e), error_body(e)),
            Self::Classify(e) => (StatusCode::BAD_GATEWAY, error_body(e)),
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// CATEGORY RESOLUTION
// =============================================================================

/// Use the client's category when given, otherwise ask the classifier.
/// Runs before any store call; the store lock is never held across it.
///
/// # Errors
///
/// `Validation` on field `category` when the given value is unknown or no
/// category could be determined.
pub(crate) async fn resolve_category(
    state: &AppState,
    text: &str,
    category: Option<&str>,
) -> Result<Category, SessionError> {
    if let Some(raw) = category.map(str::trim).filter(|c| !c.is_empty()) {
        return Ok(raw.parse::<Category>()?);
    }
    let guess = match state.classifier.classify(text).await {
        Ok(guess) => guess,
        Err(e) => {
            warn!(error = %e, text, "classify: failed");
            None
        }
    };
    guess.ok_or_else(|| SessionError::Validation {
        field: "category",
        message: "could not determine a category; choose one".to_owned(),
        suggestion: None,
    })
}

// =============================================================================
// BODIES
// =============================================================================

#[derive(Deserialize)]
pub struct CreateSessionBody {
    #[serde(default)]
    pub description: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct JoinBody {
    pub name: String,
}

#[derive(Deserialize)]
pub struct RejoinBody {
    pub code: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantBody {
    pub participant_id: Uuid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTagBody {
    pub participant_id: Uuid,
    pub text: String,
    pub category: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteBody {
    pub participant_id: Uuid,
    pub value: i64,
}

#[derive(Deserialize)]
pub struct ClassifyBody {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub participant_id: Uuid,
    pub participant_code: String,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub participant_id: Uuid,
    pub participant_code: String,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejoinResponse {
    pub participant_id: Uuid,
    pub participant_code: String,
    pub name: String,
    pub is_creator: bool,
    pub is_admin: bool,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTagResponse {
    pub tag: TagSnapshot,
    pub was_newly_created: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub tag_id: Uuid,
    pub total_score: i64,
    pub votes: Vec<VoteSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub category: Option<Category>,
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/session` — create (or replace) the session.
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let created = state
        .store
        .create_session(&body.description, &body.name)?;
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: created.session_id,
            participant_id: created.participant_id,
            participant_code: created.participant_code,
            session: created.snapshot,
        }),
    ))
}

/// `GET /api/session/:id` — full snapshot.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.store.get_session(&session_id)?))
}

/// `DELETE /api/session/:id` — admin-only discard.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<ParticipantBody>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .delete_session(&session_id, body.participant_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/session/:id/join`
pub async fn join_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<JoinBody>,
) -> Result<(StatusCode, Json<JoinResponse>), ApiError> {
    let joined = state.store.join_session(&session_id, &body.name)?;
    Ok((
        StatusCode::CREATED,
        Json(JoinResponse {
            participant_id: joined.participant_id,
            participant_code: joined.participant_code,
            session: joined.snapshot,
        }),
    ))
}

/// `POST /api/session/:id/rejoin`
pub async fn rejoin_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<RejoinBody>,
) -> Result<Json<RejoinResponse>, ApiError> {
    let rejoined = state
        .store
        .rejoin_session(&session_id, &body.code)?;
    Ok(Json(RejoinResponse {
        participant_id: rejoined.participant_id,
        participant_code: rejoined.participant_code,
        name: rejoined.name,
        is_creator: rejoined.is_creator,
        is_admin: rejoined.is_admin,
        session: rejoined.snapshot,
    }))
}

/// `POST /api/session/:id/complete` — admin-only close.
pub async fn complete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<ParticipantBody>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(
        state
            .store
            .complete_session(&session_id, body.participant_id)?,
    ))
}

/// `POST /api/session/:id/tags` — propose a tag or endorse a duplicate.
pub async fn add_tag(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<AddTagBody>,
) -> Result<(StatusCode, Json<AddTagResponse>), ApiError> {
    let category = resolve_category(&state, &body.text, body.category.as_deref()).await?;
    let added = state
        .store
        .add_tag(&session_id, body.participant_id, &body.text, category)?;
    let status = if added.was_newly_created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(AddTagResponse { tag: added.tag, was_newly_created: added.was_newly_created })))
}

/// `POST /api/session/:id/tags/:tag_id/vote`
pub async fn vote(
    State(state): State<AppState>,
    Path((session_id, tag_id)): Path<(String, Uuid)>,
    Json(body): Json<VoteBody>,
) -> Result<Json<VoteResponse>, ApiError> {
    let outcome = state
        .store
        .vote(&session_id, body.participant_id, tag_id, body.value)?;
    Ok(Json(VoteResponse { tag_id: outcome.tag_id, total_score: outcome.total_score, votes: outcome.votes }))
}

/// `POST /api/classify` — category guess for free text.
pub async fn classify(
    State(state): State<AppState>,
    Json(body): Json<ClassifyBody>,
) -> Result<Json<ClassifyResponse>, ApiError> {
    let category = state.classifier.classify(&body.text).await?;
    Ok(Json(ClassifyResponse { category }))
}

#[cfg(test)]
#[path = "sessions_test.rs"]
mod tests;
