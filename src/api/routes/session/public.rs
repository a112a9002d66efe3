use serde::{Deserialize, Serialize};

use crate::study::{Turn, TurnOutcome, UploadedDocument};

/// Participant identity carried on every request.
#[derive(Debug, Default, Deserialize)]
pub struct IdentityQuery {
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub gender: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub log_id: String,
    pub case: u32,
    pub delay_enabled: bool,
    pub prompt_source: Option<String>,
    pub turns: Vec<Turn>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadRequest {
    pub documents: Vec<UploadedDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    pub elapsed_secs: f64,
    pub delayed_secs: f64,
    pub error: Option<String>,
    pub store_errors: Vec<String>,
}

impl From<TurnOutcome> for ChatResponse {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            reply: outcome.reply,
            elapsed_secs: outcome.elapsed_secs,
            delayed_secs: outcome.delayed_secs,
            error: outcome.error,
            store_errors: outcome.store_errors,
        }
    }
}
