use anyhow::{Error, Result};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use super::case::Case;
use super::session::{LogIdentifier, Participant, Role, Turn};

/// A session row plus its turns in insertion order.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub participant: Participant,
    pub case: Case,
    pub prompt: Option<Vec<String>>,
    pub prompt_source: Option<String>,
    pub turns: Vec<Turn>,
}

pub async fn get_or_create_session(
    db: &Connection,
    log_id: &LogIdentifier,
    participant: &Participant,
    case: Case,
) -> Result<(), Error> {
    let log_id = log_id.to_string();
    let participant = participant.clone();
    db.call(move |conn| {
        conn.execute(
            "INSERT OR IGNORE INTO study_session (log_id, user_id, display_name, gender, case_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                log_id,
                participant.id,
                participant.display_name,
                participant.gender,
                case.label()
            ],
        )?;
        Ok(())
    })
    .await?;
    Ok(())
}

/// Log identifier of the participant's session in `case`, if one was
/// ever created. The identifier keeps the date it was first opened on,
/// so later requests rejoin the same session on any day.
pub async fn find_log_id(
    db: &Connection,
    user_id: &str,
    case: Case,
) -> Result<Option<LogIdentifier>, Error> {
    let user_id = user_id.to_string();
    let found = db
        .call(move |conn| {
            let log_id: Option<String> = conn
                .query_row(
                    "SELECT log_id FROM study_session
                     WHERE user_id = ?1 AND case_id = ?2
                     ORDER BY created_at, rowid
                     LIMIT 1",
                    rusqlite::params![user_id, case.label()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(log_id)
        })
        .await?;
    Ok(found.map(|raw| LogIdentifier::from_raw(&raw)))
}

type SessionRow = (
    String,
    Option<String>,
    Option<String>,
    u32,
    Option<String>,
    Option<String>,
);

pub async fn find_session(
    db: &Connection,
    log_id: &LogIdentifier,
) -> Result<Option<StoredSession>, Error> {
    let l_id = log_id.to_string();
    let found = db
        .call(move |conn| {
            let row: Option<SessionRow> = conn
                .query_row(
                    "SELECT user_id, display_name, gender, case_id, prompt, prompt_source
                     FROM study_session WHERE log_id = ?",
                    [&l_id],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        ))
                    },
                )
                .optional()?;
            let Some(row) = row else {
                return Ok(None);
            };

            let mut stmt =
                conn.prepare("SELECT role, content FROM study_turn WHERE log_id = ? ORDER BY id")?;
            let turns = stmt
                .query_map([&l_id], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
                .collect::<Result<Vec<(String, String)>, rusqlite::Error>>()?;
            Ok(Some((row, turns)))
        })
        .await?;

    let Some(((user_id, display_name, gender, case_id, prompt, prompt_source), raw_turns)) = found
    else {
        return Ok(None);
    };

    let prompt = match prompt {
        Some(json) => Some(serde_json::from_str::<Vec<String>>(&json)?),
        None => None,
    };
    let turns = raw_turns
        .into_iter()
        .map(|(role, content)| Ok(Turn::new(role.parse::<Role>()?, &content)))
        .collect::<Result<Vec<Turn>, Error>>()?;

    Ok(Some(StoredSession {
        participant: Participant {
            id: user_id,
            display_name,
            gender,
        },
        case: Case::new(case_id),
        prompt,
        prompt_source,
        turns,
    }))
}

/// Stores the prompt only if the session doesn't have one yet. Returns
/// whether this call set it.
pub async fn set_prompt_if_absent(
    db: &Connection,
    log_id: &LogIdentifier,
    lines: &[String],
    source: Option<&str>,
) -> Result<bool, Error> {
    let l_id = log_id.to_string();
    let prompt = serde_json::to_string(lines)?;
    let source = source.map(str::to_string);
    let updated = db
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE study_session SET prompt = ?1, prompt_source = ?2
                 WHERE log_id = ?3 AND prompt IS NULL",
                rusqlite::params![prompt, source, l_id],
            )?;
            Ok(n)
        })
        .await?;
    Ok(updated > 0)
}

pub async fn insert_turn(db: &Connection, log_id: &LogIdentifier, turn: &Turn) -> Result<(), Error> {
    let l_id = log_id.to_string();
    let role = turn.role.as_str().to_string();
    let content = turn.content.clone();
    db.call(move |conn| {
        let mut stmt =
            conn.prepare("INSERT INTO study_turn (log_id, role, content) VALUES (?, ?, ?)")?;
        stmt.execute([l_id, role, content])?;
        Ok(())
    })
    .await?;
    Ok(())
}

/// Log identifiers of every session, most recent first.
pub async fn list_sessions(db: &Connection) -> Result<Vec<String>, Error> {
    let ids = db
        .call(|conn| {
            let mut stmt =
                conn.prepare("SELECT log_id FROM study_session ORDER BY created_at DESC, log_id")?;
            let rows = stmt
                .query_map([], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<String>, rusqlite::Error>>()?;
            Ok(rows)
        })
        .await?;
    Ok(ids)
}
