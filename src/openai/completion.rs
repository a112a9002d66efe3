use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

pub async fn completion(
    messages: &[Message],
    api_hostname: &str,
    api_key: &str,
    model: &str,
) -> Result<Value, Error> {
    let payload = json!({
        "model": model,
        "messages": messages,
    });
    let url = format!("{}/v1/chat/completions", api_hostname.trim_end_matches("/"));
    let response = reqwest::Client::new()
        .post(url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60 * 10))
        .json(&payload)
        .send()
        .await?;

    let status = response.status();
    let body: Value = response.json().await?;
    if !status.is_success() {
        let detail = body["error"]["message"].as_str().unwrap_or("unknown error");
        return Err(anyhow!("OpenAI request failed: {} ({})", status, detail));
    }

    Ok(body)
}

/// Pulls the reply text out of a chat completion. `content` is either
/// a plain string or a list of typed parts, in which case only the
/// `text` parts are kept, in order.
pub fn completion_text(resp: &Value) -> Result<String, Error> {
    let content = &resp["choices"][0]["message"]["content"];
    if let Some(text) = content.as_str() {
        return Ok(text.to_string());
    }
    if let Some(parts) = content.as_array() {
        let text = parts
            .iter()
            .filter(|p| p["type"].as_str() == Some("text"))
            .filter_map(|p| p["text"].as_str())
            .collect::<String>();
        return Ok(text);
    }
    Err(anyhow!("No message received. Resp:\n\n {}", resp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), r#""system""#);
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            r#""assistant""#
        );
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
    }

    #[test]
    fn test_message_new() {
        let msg = Message::new(Role::User, "Hello world");
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"role":"user","content":"Hello world"}"#
        );
    }

    #[test]
    fn test_completion_text_string_content() {
        let resp = json!({"choices": [{"message": {"role": "assistant", "content": "Hello!"}}]});
        assert_eq!(completion_text(&resp).unwrap(), "Hello!");
    }

    #[test]
    fn test_completion_text_multipart_content() {
        let resp = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "Hel"},
            {"type": "image_url", "image_url": {"url": "https://example.com/x.png"}},
            {"type": "text", "text": "lo"}
        ]}}]});
        assert_eq!(completion_text(&resp).unwrap(), "Hello");
    }

    #[test]
    fn test_completion_text_missing_content() {
        let resp = json!({"choices": [{"message": {"content": null}}]});
        assert!(completion_text(&resp).is_err());
    }

    #[tokio::test]
    async fn test_completion_basic() {
        let mut server = mockito::Server::new_async().await;

        let response_body = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1694268190,
            "model": "gpt-3.5-turbo",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hello!"
                },
                "finish_reason": "stop"
            }]
        }"#;

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "gpt-3.5-turbo",
                "messages": [{"role": "user", "content": "Hi"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body)
            .create();

        let messages = vec![Message::new(Role::User, "Hi")];
        let result = completion(&messages, server.url().as_str(), "test-key", "gpt-3.5-turbo").await;

        mock.assert();
        let json = result.unwrap();
        assert_eq!(completion_text(&json).unwrap(), "Hello!");
    }

    #[tokio::test]
    async fn test_completion_auth_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": {"message": "Incorrect API key provided"}}"#)
            .create();

        let messages = vec![Message::new(Role::User, "Hi")];
        let result = completion(&messages, server.url().as_str(), "bad-key", "gpt-3.5-turbo").await;

        let err = result.unwrap_err().to_string();
        assert!(err.contains("401"));
        assert!(err.contains("Incorrect API key"));
    }
}
