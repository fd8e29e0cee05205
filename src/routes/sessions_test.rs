use std::sync::Arc;

use super::*;
use crate::classify::Classifier;
use crate::services::session::SessionStatus;
use crate::state::test_helpers;

struct NoOpinion;

#[async_trait::async_trait]
impl Classifier for NoOpinion {
    async fn classify(&self, _text: &str) -> Result<Option<Category>, ClassifyError> {
        Ok(None)
    }
}

struct Broken;

#[async_trait::async_trait]
impl Classifier for Broken {
    async fn classify(&self, _text: &str) -> Result<Option<Category>, ClassifyError> {
        Err(ClassifyError::Request("connection refused".into()))
    }
}

async fn create(state: &AppState) -> CreateSessionResponse {
    let body = CreateSessionBody { description: "weekend brunch".into(), name: "Sarah".into() };
    let (status, Json(created)) = create_session(State(state.clone()), Json(body))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    created
}

// =============================================================================
// status mapping
// =============================================================================

#[test]
fn session_error_to_status_covers_taxonomy() {
    let validation = SessionError::Validation { field: "text", message: "bad".into(), suggestion: None };
    assert_eq!(session_error_to_status(&validation), StatusCode::BAD_REQUEST);
    assert_eq!(session_error_to_status(&SessionError::NotFound("session")), StatusCode::NOT_FOUND);
    assert_eq!(session_error_to_status(&SessionError::Inactive(SessionStatus::Completed)), StatusCode::GONE);
    assert_eq!(session_error_to_status(&SessionError::NameConflict("a".into())), StatusCode::CONFLICT);
    assert_eq!(session_error_to_status(&SessionError::Forbidden("delete")), StatusCode::FORBIDDEN);
    assert_eq!(session_error_to_status(&SessionError::SessionFull), StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn error_body_carries_code_field_and_suggestion() {
    let err = SessionError::Validation {
        field: "text",
        message: "tag text must not contain spaces".into(),
        suggestion: Some("coffee-shop".into()),
    };
    let body = error_body(&err);
    assert_eq!(body["code"], serde_json::json!("E_VALIDATION"));
    assert_eq!(body["field"], serde_json::json!("text"));
    assert_eq!(body["suggestion"], serde_json::json!("coffee-shop"));
    assert_eq!(body["retryable"], serde_json::json!(false));
}

#[test]
fn api_error_response_status() {
    let response = ApiError::from(SessionError::NotFound("session")).into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = ApiError::from(ClassifyError::Parse("x".into())).into_response();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

// =============================================================================
// handlers
// =============================================================================

#[tokio::test]
async fn create_join_get_round() {
    let state = test_helpers::test_app_state();
    let created = create(&state).await;
    assert_eq!(created.session_id, "current");

    let (status, Json(joined)) = join_session(
        State(state.clone()),
        Path(created.session_id.clone()),
        Json(JoinBody { name: "Mike".into() }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(joined.session.participants.len(), 2);

    let Json(snapshot) = get_session(State(state.clone()), Path(created.session_id.clone()))
        .await
        .unwrap();
    assert_eq!(snapshot.participants.len(), 2);

    let Json(rejoined) = rejoin_session(
        State(state),
        Path(created.session_id),
        Json(RejoinBody { code: joined.participant_code.clone() }),
    )
    .await
    .unwrap();
    assert_eq!(rejoined.participant_id, joined.participant_id);
    assert_eq!(rejoined.name, "Mike");
    assert!(!rejoined.is_admin);
}

#[tokio::test]
async fn join_conflict_maps_to_409() {
    let state = test_helpers::test_app_state();
    let created = create(&state).await;
    let err = join_session(State(state), Path(created.session_id), Json(JoinBody { name: "sarah".into() }))
        .await
        .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn add_tag_with_explicit_category() {
    let state = test_helpers::test_app_state();
    let created = create(&state).await;
    let body = AddTagBody {
        participant_id: created.participant_id,
        text: "bowling".into(),
        category: Some("Food".into()),
    };
    let (status, Json(added)) = add_tag(State(state), Path(created.session_id), Json(body))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert!(added.was_newly_created);
    assert_eq!(added.tag.category, Category::Food);
}

#[tokio::test]
async fn add_tag_classifies_missing_category() {
    let state = test_helpers::test_app_state();
    let created = create(&state).await;
    let body = AddTagBody { participant_id: created.participant_id, text: "brunch".into(), category: None };
    let (_, Json(added)) = add_tag(State(state.clone()), Path(created.session_id.clone()), Json(body))
        .await
        .unwrap();
    assert_eq!(added.tag.category, Category::Food);

    // Duplicate is 200, not 201.
    let body = AddTagBody { participant_id: created.participant_id, text: "Brunch".into(), category: None };
    let (status, Json(again)) = add_tag(State(state), Path(created.session_id), Json(body))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(!again.was_newly_created);
    assert_eq!(again.tag.total_score, 1);
}

#[tokio::test]
async fn unknown_category_is_validation_error() {
    let state = test_helpers::test_app_state();
    let err = resolve_category(&state, "brunch", Some("weather"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Validation { field: "category", .. }));
}

#[tokio::test]
async fn undetermined_category_is_validation_error() {
    for classifier in [Arc::new(NoOpinion) as Arc<dyn Classifier>, Arc::new(Broken)] {
        let state = test_helpers::test_app_state_with_classifier(classifier);
        let err = resolve_category(&state, "brunch", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Validation { field: "category", .. }));
    }
}

#[tokio::test]
async fn blank_category_defers_to_classifier() {
    let state = test_helpers::test_app_state();
    assert_eq!(resolve_category(&state, "park", Some("  ")).await.unwrap(), Category::Location);
}

#[tokio::test]
async fn vote_and_complete() {
    let state = test_helpers::test_app_state();
    let created = create(&state).await;
    let sid = created.session_id.clone();
    let body = AddTagBody { participant_id: created.participant_id, text: "tacos".into(), category: Some("food".into()) };
    let (_, Json(added)) = add_tag(State(state.clone()), Path(sid.clone()), Json(body))
        .await
        .unwrap();

    let Json(voted) = vote(
        State(state.clone()),
        Path((sid.clone(), added.tag.id)),
        Json(VoteBody { participant_id: created.participant_id, value: -1 }),
    )
    .await
    .unwrap();
    assert_eq!(voted.total_score, -1);

    let err = vote(
        State(state.clone()),
        Path((sid.clone(), added.tag.id)),
        Json(VoteBody { participant_id: created.participant_id, value: 3 }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

    let Json(snapshot) = complete_session(
        State(state.clone()),
        Path(sid.clone()),
        Json(ParticipantBody { participant_id: created.participant_id }),
    )
    .await
    .unwrap();
    assert_eq!(snapshot.status, SessionStatus::Completed);

    let err = vote(
        State(state),
        Path((sid, added.tag.id)),
        Json(VoteBody { participant_id: created.participant_id, value: 1 }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::GONE);
}

#[tokio::test]
async fn delete_requires_admin() {
    let state = test_helpers::test_app_state();
    let created = create(&state).await;
    let (_, Json(mike)) = join_session(
        State(state.clone()),
        Path(created.session_id.clone()),
        Json(JoinBody { name: "Mike".into() }),
    )
    .await
    .unwrap();

    let err = delete_session(
        State(state.clone()),
        Path(created.session_id.clone()),
        Json(ParticipantBody { participant_id: mike.participant_id }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

    let status = delete_session(
        State(state.clone()),
        Path(created.session_id.clone()),
        Json(ParticipantBody { participant_id: created.participant_id }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let err = get_session(State(state), Path(created.session_id))
        .await
        .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn classify_endpoint() {
    let state = test_helpers::test_app_state();
    let Json(reply) = classify(State(state.clone()), Json(ClassifyBody { text: "saturday-11am".into() }))
        .await
        .unwrap();
    assert_eq!(reply.category, Some(Category::Time));

    let Json(reply) = classify(State(state), Json(ClassifyBody { text: "zzz".into() }))
        .await
        .unwrap();
    assert!(reply.category.is_none());
}
