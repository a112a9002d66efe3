//! Google OAuth helpers for the Drive integration.

use anyhow::{Error, Result};
use reqwest::Client;
use serde::Deserialize;

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
}

async fn request_token(oauth_hostname: &str, params: &[(&str, &str)]) -> Result<TokenResponse, Error> {
    let url = format!("{}/token", oauth_hostname.trim_end_matches('/'));
    let res = Client::new().post(&url).form(params).send().await?;
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("Token request failed: {} ({})", status, text);
    }
    let token: TokenResponse = serde_json::from_str(&text)?;
    Ok(token)
}

/// Trade an authorization code from the consent screen for tokens.
pub async fn exchange_code_for_token(
    oauth_hostname: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenResponse, Error> {
    request_token(
        oauth_hostname,
        &[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ],
    )
    .await
}

/// Get a fresh access token using a stored refresh token.
pub async fn refresh_access_token(
    oauth_hostname: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenResponse, Error> {
    request_token(
        oauth_hostname,
        &[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ],
    )
    .await
}

pub fn consent_url(client_id: &str, redirect_uri: &str) -> String {
    format!(
        "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(DRIVE_SCOPE)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refresh_access_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                mockito::Matcher::UrlEncoded("refresh_token".into(), "r-123".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "a-456", "expires_in": 3599, "token_type": "Bearer"}"#)
            .create();

        let token = refresh_access_token(&server.url(), "id", "secret", "r-123")
            .await
            .unwrap();

        mock.assert();
        assert_eq!(token.access_token, "a-456");
        assert_eq!(token.expires_in, Some(3599));
        assert!(token.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_refresh_access_token_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error": "invalid_grant"}"#)
            .create();

        let result = refresh_access_token(&server.url(), "id", "secret", "stale").await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("invalid_grant"));
    }

    #[test]
    fn test_consent_url_encodes_params() {
        let url = consent_url("my id", "urn:ietf:wg:oauth:2.0:oob");
        assert!(url.contains("client_id=my%20id"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains(&urlencoding::encode(DRIVE_SCOPE).to_string()));
    }
}
