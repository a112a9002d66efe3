//! Client for the Anthropic Messages API.
//!
//! The system prompt travels in its own `system` field rather than as
//! a message, and the reply is a list of typed content blocks.

use std::time::Duration;

use anyhow::{Context, Error, Result};
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT_SECS: u64 = 60 * 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
}

/// Content block of a reply. Anything other than text is kept only as
/// a marker so unknown block types never fail deserialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub id: Option<String>,
    pub content: Vec<ContentBlock>,
    pub model: Option<String>,
    pub stop_reason: Option<String>,
}

impl MessageResponse {
    /// Concatenates the text blocks in order, ignoring the rest.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect()
    }
}

pub async fn create_message(
    request: &MessageRequest,
    api_hostname: &str,
    api_key: &str,
) -> Result<MessageResponse, Error> {
    let url = format!("{}/v1/messages", api_hostname.trim_end_matches('/'));
    tracing::debug!("Sending request to Anthropic API: model={}", request.model);

    let response = reqwest::Client::new()
        .post(url)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("content-type", "application/json")
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .json(request)
        .send()
        .await
        .context("Failed to send request to Anthropic API")?;

    let status = response.status();
    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        anyhow::bail!(
            "Anthropic API request failed\n\nStatus: {}\nBody: {}",
            status,
            error_body
        );
    }

    let message_response: MessageResponse = response
        .json()
        .await
        .context("Failed to parse Anthropic API response")?;

    Ok(message_response)
}
