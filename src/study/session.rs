//! The per-participant session aggregate.
//!
//! Every interaction rebuilds a `SessionState` from storage and then
//! calls the `ensure_*` initializers. Each one returns early when its
//! field is already populated, so a case is assigned and a prompt is
//! resolved at most once no matter how often the flow re-runs.

use std::fmt;
use std::str::FromStr;

use anyhow::{Error, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::case::{Case, CaseAssigner};
use super::error::StudyError;
use super::prompt::{PromptSource, resolve_prompt};
use super::transcript;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(anyhow!("Unknown role: {}", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub id: String,
    pub display_name: Option<String>,
    pub gender: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Participant {
    /// Fails with `MissingIdentifier` when no id was supplied. Whether
    /// the id is an integer is checked when the case is assigned.
    pub fn new(
        id: Option<&str>,
        display_name: Option<&str>,
        gender: Option<&str>,
    ) -> Result<Self, StudyError> {
        let id = non_blank(id).ok_or(StudyError::MissingIdentifier)?;
        Ok(Self {
            id,
            display_name: non_blank(display_name),
            gender: non_blank(gender),
        })
    }
}

/// `<user_id>_<DD_MM_YYYY>_case<N>`, the key transcripts are stored under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LogIdentifier(String);

impl LogIdentifier {
    pub fn new(user_id: &str, date: NaiveDate, case: Case) -> Self {
        Self(format!(
            "{}_{}_case{}",
            user_id,
            date.format("%d_%m_%Y"),
            case.label()
        ))
    }

    /// Wraps an identifier that was stored or typed in verbatim.
    pub fn from_raw(raw: &str) -> Self {
        Self(raw.trim().trim_end_matches(".txt").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}.txt", self.0)
    }
}

impl fmt::Display for LogIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub struct SessionState {
    pub participant: Participant,
    pub case: Option<Case>,
    pub log_id: Option<LogIdentifier>,
    pub prompt: Option<Vec<String>>,
    /// Name of the document the prompt came from.
    pub prompt_source: Option<String>,
    pub turns: Vec<Turn>,
}

impl SessionState {
    pub fn new(participant: Participant) -> Self {
        Self {
            participant,
            case: None,
            log_id: None,
            prompt: None,
            prompt_source: None,
            turns: Vec::new(),
        }
    }

    pub fn ensure_case(&mut self, assigner: &CaseAssigner) -> Result<Case, StudyError> {
        if let Some(case) = self.case {
            return Ok(case);
        }
        let case = assigner.assign(&self.participant.id)?;
        self.case = Some(case);
        Ok(case)
    }

    pub fn ensure_log_id(
        &mut self,
        assigner: &CaseAssigner,
        date: NaiveDate,
    ) -> Result<LogIdentifier, StudyError> {
        if let Some(log_id) = &self.log_id {
            return Ok(log_id.clone());
        }
        let case = self.ensure_case(assigner)?;
        let log_id = LogIdentifier::new(&self.participant.id, date, case);
        self.log_id = Some(log_id.clone());
        Ok(log_id)
    }

    /// Resolves and personalizes the prompt unless one is already set.
    /// Returns `true` only when a new prompt was resolved.
    pub async fn ensure_prompt(
        &mut self,
        assigner: &CaseAssigner,
        source: PromptSource<'_>,
    ) -> Result<bool, StudyError> {
        if self.prompt.is_some() {
            return Ok(false);
        }
        let case = self.ensure_case(assigner)?;
        let resolved = resolve_prompt(source, case, &self.participant).await?;
        self.prompt = Some(resolved.lines);
        self.prompt_source = Some(resolved.source);
        Ok(true)
    }

    pub fn prompt_lines(&self) -> &[String] {
        self.prompt.as_deref().unwrap_or_default()
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn transcript(&self) -> String {
        transcript::build(self.prompt_lines(), &self.turns)
    }
}
