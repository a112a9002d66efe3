//! One interaction of the chat study: rebuild the session from storage,
//! initialize whatever is still missing, then run a turn.

use anyhow::{Error, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tokio_rusqlite::Connection;

use super::case::CaseAssigner;
use super::db;
use super::delay::DelayPolicy;
use super::generate::{Backend, generate};
use super::prompt::PromptSource;
use super::session::{Participant, Role, SessionState, Turn};
use super::transcript::{BoxedTranscriptSink, persist};

/// Reads the participant's stored session without creating or
/// resolving anything. `None` when they never opened one.
pub async fn load_session(
    db: &Connection,
    assigner: &CaseAssigner,
    participant: &Participant,
) -> Result<Option<SessionState>, Error> {
    let case = assigner.assign(&participant.id)?;
    let Some(log_id) = db::find_log_id(db, &participant.id, case).await? else {
        return Ok(None);
    };
    let Some(stored) = db::find_session(db, &log_id).await? else {
        return Ok(None);
    };

    let mut state = SessionState::new(stored.participant);
    state.case = Some(stored.case);
    state.log_id = Some(log_id);
    state.prompt = stored.prompt;
    state.prompt_source = stored.prompt_source;
    state.turns = stored.turns;
    Ok(Some(state))
}

/// Loads the session for `participant`, creating it with a log id
/// dated `today` when there is none, and makes sure a prompt is
/// resolved and stored.
///
/// Values already in storage always win over freshly computed ones,
/// including the log id and the date inside it.
pub async fn open_session(
    db: &Connection,
    assigner: &CaseAssigner,
    participant: Participant,
    today: NaiveDate,
    source: PromptSource<'_>,
) -> Result<SessionState, Error> {
    let existing = load_session(db, assigner, &participant).await?;
    let mut state = match existing {
        Some(state) => state,
        None => {
            let mut state = SessionState::new(participant);
            let case = state.ensure_case(assigner)?;
            let log_id = state.ensure_log_id(assigner, today)?;
            db::get_or_create_session(db, &log_id, &state.participant, case).await?;
            // A concurrent first request may have created the row already
            let reloaded = load_session(db, assigner, &state.participant).await?;
            reloaded.unwrap_or(state)
        }
    };
    let log_id = state.ensure_log_id(assigner, today)?;

    if state.ensure_prompt(assigner, source).await? {
        let lines = state.prompt_lines().to_vec();
        let stored =
            db::set_prompt_if_absent(db, &log_id, &lines, state.prompt_source.as_deref()).await?;
        if !stored {
            // A concurrent request stored its prompt first, keep that one
            if let Some(existing) = db::find_session(db, &log_id).await? {
                state.prompt = existing.prompt;
                state.prompt_source = existing.prompt_source;
            }
        }
    }

    tracing::info!(
        "Session {} ready with {} turns",
        log_id,
        state.turns.len()
    );
    Ok(state)
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub elapsed_secs: f64,
    pub delayed_secs: f64,
    pub error: Option<String>,
    pub store_errors: Vec<String>,
}

/// Runs one user turn: record the message, get a reply, pad it in
/// delay-enabled cases, record the reply and write the transcript.
pub async fn take_turn(
    db: &Connection,
    state: &mut SessionState,
    assigner: &CaseAssigner,
    backend: &Backend,
    delay: &DelayPolicy,
    sinks: &[BoxedTranscriptSink],
    message: &str,
) -> Result<TurnOutcome, Error> {
    let case = state.ensure_case(assigner)?;
    let log_id = match &state.log_id {
        Some(log_id) => log_id.clone(),
        None => anyhow::bail!("Session for {} was not opened", state.participant.id),
    };

    let user_turn = Turn::new(Role::User, message);
    db::insert_turn(db, &log_id, &user_turn).await?;
    state.push_turn(user_turn);

    let reply = generate(backend, state.prompt_lines(), &state.turns).await;
    let waited = delay
        .pad(assigner.is_delay_enabled(case), reply.elapsed_secs)
        .await;

    let assistant_turn = Turn::new(Role::Assistant, &reply.text);
    db::insert_turn(db, &log_id, &assistant_turn).await?;
    state.push_turn(assistant_turn);

    let store_errors = persist(sinks, &log_id.file_name(), &state.transcript()).await;

    Ok(TurnOutcome {
        reply: reply.text,
        elapsed_secs: reply.elapsed_secs,
        delayed_secs: waited.as_secs_f64(),
        error: reply.error,
        store_errors: store_errors.iter().map(|e| e.to_string()).collect(),
    })
}
