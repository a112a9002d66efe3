//! Router for the study session API

use std::sync::{Arc, RwLock};

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::Query;
use tokio_rusqlite::Connection;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::study::prompt::BoxedPromptStore;
use crate::study::transcript::{BoxedTranscriptSink, TRANSCRIPT_MIME};
use crate::study::{
    Backend, CaseAssigner, DelayPolicy, Participant, PromptSource, SessionState, StudyError,
    load_session, open_session, take_turn,
};

type SharedState = Arc<RwLock<AppState>>;

/// Everything a handler needs, cloned out so the lock isn't held
/// across awaits.
struct Handles {
    db: Connection,
    assigner: CaseAssigner,
    delay: DelayPolicy,
    prompts: BoxedPromptStore,
    sinks: Vec<BoxedTranscriptSink>,
    backend: Result<Backend, StudyError>,
}

fn handles(state: &SharedState) -> Handles {
    let state = state.read().expect("Unable to read share state");
    Handles {
        db: state.db.clone(),
        assigner: state.assigner.clone(),
        delay: state.delay.clone(),
        prompts: Arc::clone(&state.prompts),
        sinks: state.sinks.clone(),
        backend: Backend::from_config(&state.config),
    }
}

fn participant(params: &public::IdentityQuery) -> Result<Participant, ApiError> {
    Ok(Participant::new(
        params.user_id.as_deref(),
        params.name.as_deref(),
        params.gender.as_deref(),
    )?)
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

fn session_response(state: &SessionState, assigner: &CaseAssigner) -> public::SessionResponse {
    public::SessionResponse {
        log_id: state
            .log_id
            .as_ref()
            .map(|l| l.to_string())
            .unwrap_or_default(),
        case: state.case.map(|c| c.label()).unwrap_or_default(),
        delay_enabled: state.case.is_some_and(|c| assigner.is_delay_enabled(c)),
        prompt_source: state.prompt_source.clone(),
        turns: state.turns.clone(),
    }
}

/// Open or rehydrate the session using the case keyed prompt store
async fn open(
    State(state): State<SharedState>,
    Query(params): Query<public::IdentityQuery>,
) -> Result<Json<public::SessionResponse>, ApiError> {
    let h = handles(&state);
    let session = open_session(
        &h.db,
        &h.assigner,
        participant(&params)?,
        today(),
        PromptSource::Store(&*h.prompts),
    )
    .await?;
    Ok(Json(session_response(&session, &h.assigner)))
}

/// Open the session choosing the prompt from uploaded documents
async fn open_with_upload(
    State(state): State<SharedState>,
    Query(params): Query<public::IdentityQuery>,
    Json(body): Json<public::UploadRequest>,
) -> Result<Json<public::SessionResponse>, ApiError> {
    let h = handles(&state);
    let session = open_session(
        &h.db,
        &h.assigner,
        participant(&params)?,
        today(),
        PromptSource::Uploaded(&body.documents),
    )
    .await?;
    Ok(Json(session_response(&session, &h.assigner)))
}

/// Send a participant message and wait for the assistant reply
async fn chat(
    State(state): State<SharedState>,
    Query(params): Query<public::IdentityQuery>,
    Json(body): Json<public::ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let participant = participant(&params)?;
    if body.message.trim().is_empty() {
        return Ok((StatusCode::BAD_REQUEST, "Message must not be empty").into_response());
    }

    let h = handles(&state);
    // Checked before anything is recorded so a misconfigured backend
    // doesn't leave a dangling user turn
    let backend = h.backend?;
    let mut session = open_session(
        &h.db,
        &h.assigner,
        participant,
        today(),
        PromptSource::Store(&*h.prompts),
    )
    .await?;
    let outcome = take_turn(
        &h.db,
        &mut session,
        &h.assigner,
        &backend,
        &h.delay,
        &h.sinks,
        &body.message,
    )
    .await?;

    Ok(Json(public::ChatResponse::from(outcome)).into_response())
}

/// Download the transcript as a text file. Read only, a participant
/// without a session gets a 404.
async fn transcript(
    State(state): State<SharedState>,
    Query(params): Query<public::IdentityQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let h = handles(&state);
    let participant = participant(&params)?;
    let session = load_session(&h.db, &h.assigner, &participant)
        .await?
        .ok_or_else(|| StudyError::SessionNotFound(participant.id.clone()))?;
    let file_name = session
        .log_id
        .as_ref()
        .map(|l| l.file_name())
        .unwrap_or_else(|| "transcript.txt".to_string());

    Ok((
        [
            (header::CONTENT_TYPE, TRANSCRIPT_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        session.transcript(),
    ))
}

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/session", post(open))
        .route("/session/upload", post(open_with_upload))
        .route("/chat", post(chat))
        .route("/transcript", get(transcript))
}
