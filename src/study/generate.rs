//! Produces the assistant reply for a turn from the configured
//! completion API.

use std::time::Instant;

use anyhow::{Error, Result};

use super::error::StudyError;
use super::session::{Role, Turn};
use crate::anthropic::{self, MessageRequest};
use crate::core::{AppConfig, BackendKind};
use crate::openai::{self, Message};

/// Text recorded as the assistant reply when the backend call fails.
pub const ERROR_REPLY: &str = "Error";

#[derive(Clone, Debug)]
pub enum Backend {
    OpenAi {
        api_hostname: String,
        api_key: String,
        model: String,
    },
    Anthropic {
        api_hostname: String,
        api_key: String,
        model: String,
        max_tokens: u32,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub text: String,
    /// Seconds spent waiting on the backend; 0 on failure
    pub elapsed_secs: f64,
    pub error: Option<String>,
}

impl Backend {
    pub fn from_config(config: &AppConfig) -> Result<Self, StudyError> {
        match config.backend {
            BackendKind::OpenAi => Ok(Backend::OpenAi {
                api_hostname: config.openai_api_hostname.clone(),
                api_key: config
                    .openai_api_key
                    .clone()
                    .ok_or(StudyError::MissingCredential("OPENAI_API_KEY"))?,
                model: config.openai_model.clone(),
            }),
            BackendKind::Anthropic => Ok(Backend::Anthropic {
                api_hostname: config.anthropic_api_hostname.clone(),
                api_key: config
                    .anthropic_api_key
                    .clone()
                    .ok_or(StudyError::MissingCredential("ANTHROPIC_API_KEY"))?,
                model: config.anthropic_model.clone(),
                max_tokens: config.anthropic_max_tokens,
            }),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Backend::OpenAi { model, .. } | Backend::Anthropic { model, .. } => model,
        }
    }

    async fn complete(&self, system: &str, turns: &[Turn]) -> Result<String, Error> {
        match self {
            Backend::OpenAi {
                api_hostname,
                api_key,
                model,
            } => {
                let mut messages = Vec::with_capacity(turns.len() + 1);
                if !system.is_empty() {
                    messages.push(Message::new(openai::Role::System, system));
                }
                messages.extend(turns.iter().map(|t| {
                    let role = match t.role {
                        Role::User => openai::Role::User,
                        Role::Assistant => openai::Role::Assistant,
                    };
                    Message::new(role, &t.content)
                }));
                let resp = openai::completion(&messages, api_hostname, api_key, model).await?;
                openai::completion_text(&resp)
            }
            Backend::Anthropic {
                api_hostname,
                api_key,
                model,
                max_tokens,
            } => {
                let request = MessageRequest {
                    model: model.clone(),
                    max_tokens: *max_tokens,
                    system: (!system.is_empty()).then(|| system.to_string()),
                    messages: turns
                        .iter()
                        .map(|t| anthropic::Message {
                            role: t.role.to_string(),
                            content: t.content.clone(),
                        })
                        .collect(),
                };
                let resp = anthropic::create_message(&request, api_hostname, api_key).await?;
                Ok(resp.text())
            }
        }
    }
}

/// Asks the backend for the next assistant reply. The prompt lines are
/// joined into a single system instruction. Never fails: on error the
/// reply is `"Error"` with zero elapsed time and the cause is logged.
pub async fn generate(backend: &Backend, prompt: &[String], turns: &[Turn]) -> Reply {
    let system = prompt.join("\n");
    let start = Instant::now();
    match backend.complete(&system, turns).await {
        Ok(text) => Reply {
            text,
            elapsed_secs: start.elapsed().as_secs_f64(),
            error: None,
        },
        Err(e) => {
            let err = StudyError::Backend(e.to_string());
            tracing::error!("{} (model {})", err, backend.model());
            Reply {
                text: ERROR_REPLY.to_string(),
                elapsed_secs: 0.0,
                error: Some(err.to_string()),
            }
        }
    }
}
