use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::player_dto::{
    LoadOutcome, LoadQuizResponse, MountSessionResponse, MutationResponse, RecordChoiceRequest,
    RecordTextRequest,
};
use crate::error::{Error, Result};
use crate::services::answer_store::InitOutcome;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/player/sessions",
    responses(
        (status = 201, description = "Quiz page mounted", body = Json<MountSessionResponse>)
    )
)]
#[axum::debug_handler]
pub async fn mount_session(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let session = state
        .sessions
        .mount(state.backend.clone(), state.session_options())
        .await;
    Ok((
        StatusCode::CREATED,
        Json(MountSessionResponse {
            session_id: session.id(),
        }),
    ))
}

#[axum::debug_handler]
pub async fn unmount_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.sessions.unmount(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn get_view(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    let session = state.sessions.get(session_id).await?;
    Ok(Json(session.view().await).into_response())
}

#[utoipa::path(
    post,
    path = "/api/player/sessions/{session_id}/quizzes/{quiz_id}",
    params(
        ("session_id" = Uuid, Path, description = "Mounted session"),
        ("quiz_id" = String, Path, description = "Quiz to load")
    ),
    responses(
        (status = 200, description = "Quiz loaded", body = Json<LoadQuizResponse>),
        (status = 404, description = "Session or quiz not found"),
        (status = 502, description = "Quiz could not be fetched")
    )
)]
#[axum::debug_handler]
pub async fn load_quiz(
    State(state): State<AppState>,
    Path((session_id, quiz_id)): Path<(Uuid, String)>,
) -> Result<Response> {
    let session = state.sessions.get(session_id).await?;
    let outcome = session.load(&quiz_id).await?;
    let previous_quiz_id = match &outcome {
        InitOutcome::Replaced { previous_quiz_id } => Some(previous_quiz_id.clone()),
        _ => None,
    };
    let body = LoadQuizResponse {
        outcome: LoadOutcome::from(&outcome),
        previous_quiz_id,
        view: session.view().await,
    };
    Ok(Json(body).into_response())
}

#[axum::debug_handler]
pub async fn record_choice(
    State(state): State<AppState>,
    Path((session_id, question_id)): Path<(Uuid, String)>,
    payload: std::result::Result<Json<RecordChoiceRequest>, JsonRejection>,
) -> Result<Json<MutationResponse>> {
    let Json(payload) = payload?;
    payload.validate()?;
    let session = state.sessions.get(session_id).await?;
    let applied = session.record_choice(&question_id, &payload.option).await;
    Ok(Json(MutationResponse { applied }))
}

#[axum::debug_handler]
pub async fn record_text(
    State(state): State<AppState>,
    Path((session_id, question_id)): Path<(Uuid, String)>,
    payload: std::result::Result<Json<RecordTextRequest>, JsonRejection>,
) -> Result<Json<MutationResponse>> {
    let Json(payload) = payload?;
    if payload.text.chars().count() > state.config.max_text_len {
        return Err(Error::BadRequest(format!(
            "answer text exceeds {} characters",
            state.config.max_text_len
        )));
    }
    let session = state.sessions.get(session_id).await?;
    let applied = session.record_text(&question_id, &payload.text).await;
    Ok(Json(MutationResponse { applied }))
}

#[axum::debug_handler]
pub async fn clear_answer(
    State(state): State<AppState>,
    Path((session_id, question_id)): Path<(Uuid, String)>,
) -> Result<Json<MutationResponse>> {
    let session = state.sessions.get(session_id).await?;
    let applied = session.clear_answer(&question_id).await;
    Ok(Json(MutationResponse { applied }))
}

#[utoipa::path(
    post,
    path = "/api/player/sessions/{session_id}/submit",
    params(
        ("session_id" = Uuid, Path, description = "Mounted session")
    ),
    responses(
        (status = 200, description = "Submission accepted, or already owned by another trigger"),
        (status = 400, description = "No quiz loaded"),
        (status = 502, description = "Backend rejected the submission")
    )
)]
#[axum::debug_handler]
pub async fn submit(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    let session = state.sessions.get(session_id).await?;
    let outcome = session.submit().await?;
    tracing::info!(
        session_id = %session_id,
        accepted = outcome.accepted,
        "manual submit handled"
    );
    Ok(Json(outcome).into_response())
}

#[axum::debug_handler]
pub async fn get_progress(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    let session = state.sessions.get(session_id).await?;
    Ok(Json(session.progress().await).into_response())
}

#[axum::debug_handler]
pub async fn get_panel(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    let session = state.sessions.get(session_id).await?;
    Ok(Json(session.panel().await).into_response())
}

/// 204 when the index is out of range, nothing is loaded, or the attempt
/// is already submitted.
#[axum::debug_handler]
pub async fn scroll_to_question(
    State(state): State<AppState>,
    Path((session_id, index)): Path<(Uuid, i64)>,
) -> Result<Response> {
    let session = state.sessions.get(session_id).await?;
    match session.scroll_to_question(index).await {
        Some(target) => Ok(Json(target).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
