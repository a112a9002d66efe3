//! Google Drive v3 client covering what the study needs: listing a
//! folder by name filter, reading a file's text, and create-or-update
//! of a plain text file.

use std::time::{Duration, Instant};

use anyhow::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use super::oauth::refresh_access_token;
use crate::core::AppConfig;
use crate::study::error::StudyError;

const GOOGLE_DOC_MIME: &str = "application/vnd.google-apps.document";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListFilesResponse {
    files: Option<Vec<DriveFile>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug)]
struct RefreshCredentials {
    oauth_hostname: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

/// Where bearer tokens come from. Refreshed tokens are cached until
/// shortly before they expire.
#[derive(Debug)]
enum TokenSource {
    Static(String),
    Refresh {
        credentials: RefreshCredentials,
        cached: Mutex<Option<(String, Instant)>>,
    },
}

#[derive(Debug)]
pub struct DriveClient {
    api_hostname: String,
    http: Client,
    token: TokenSource,
}

/// Escape a value for use inside a single quoted Drive query string.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

impl DriveClient {
    /// Client using a fixed access token.
    pub fn with_access_token(api_hostname: &str, access_token: &str) -> Self {
        Self {
            api_hostname: api_hostname.trim_end_matches('/').to_string(),
            http: Client::new(),
            token: TokenSource::Static(access_token.to_string()),
        }
    }

    /// Client that refreshes its access token from the configured
    /// OAuth client and refresh token.
    pub fn from_config(config: &AppConfig) -> Result<Self, StudyError> {
        let client_id = config
            .google_client_id
            .clone()
            .ok_or(StudyError::MissingCredential("CASECHAT_GOOGLE_CLIENT_ID"))?;
        let client_secret = config
            .google_client_secret
            .clone()
            .ok_or(StudyError::MissingCredential("CASECHAT_GOOGLE_CLIENT_SECRET"))?;
        let refresh_token = config
            .google_refresh_token
            .clone()
            .ok_or(StudyError::MissingCredential("CASECHAT_GOOGLE_REFRESH_TOKEN"))?;

        Ok(Self {
            api_hostname: config.google_api_hostname.trim_end_matches('/').to_string(),
            http: Client::new(),
            token: TokenSource::Refresh {
                credentials: RefreshCredentials {
                    oauth_hostname: config.google_oauth_hostname.clone(),
                    client_id,
                    client_secret,
                    refresh_token,
                },
                cached: Mutex::new(None),
            },
        })
    }

    async fn access_token(&self) -> Result<String, Error> {
        match &self.token {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Refresh {
                credentials,
                cached,
            } => {
                let mut cached = cached.lock().await;
                if let Some((token, expires_at)) = cached.as_ref()
                    && Instant::now() < *expires_at
                {
                    return Ok(token.clone());
                }
                let resp = refresh_access_token(
                    &credentials.oauth_hostname,
                    &credentials.client_id,
                    &credentials.client_secret,
                    &credentials.refresh_token,
                )
                .await?;
                // Refresh a minute early so a token never expires mid-request
                let lifetime = resp.expires_in.unwrap_or(3600).saturating_sub(60);
                let expires_at = Instant::now() + Duration::from_secs(lifetime);
                *cached = Some((resp.access_token.clone(), expires_at));
                Ok(resp.access_token)
            }
        }
    }

    async fn list_by_query(&self, query: &str) -> Result<Vec<DriveFile>, Error> {
        let token = self.access_token().await?;
        let url = format!("{}/drive/v3/files", self.api_hostname);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query.to_string()),
                ("fields", "nextPageToken,files(id,name,mimeType)".to_string()),
                ("orderBy", "name".to_string()),
                ("pageSize", "100".to_string()),
            ];
            if let Some(t) = &page_token {
                params.push(("pageToken", t.clone()));
            }
            let res = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .query(&params)
                .send()
                .await?;
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            if !status.is_success() {
                anyhow::bail!("Drive list failed: {} ({})", status, text);
            }
            let page: ListFilesResponse = serde_json::from_str(&text)?;
            files.extend(page.files.unwrap_or_default());
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(files)
    }

    /// List non-trashed files under `parent_id` whose name contains `fragment`.
    pub async fn list_files(
        &self,
        parent_id: &str,
        fragment: &str,
    ) -> Result<Vec<DriveFile>, Error> {
        let query = format!(
            "'{}' in parents and name contains '{}' and trashed = false",
            escape_query_value(parent_id),
            escape_query_value(fragment)
        );
        self.list_by_query(&query).await
    }

    /// Find files under `parent_id` named exactly `name`.
    pub async fn find_by_name(&self, parent_id: &str, name: &str) -> Result<Vec<DriveFile>, Error> {
        let query = format!(
            "'{}' in parents and name = '{}' and trashed = false",
            escape_query_value(parent_id),
            escape_query_value(name)
        );
        self.list_by_query(&query).await
    }

    /// Read the full text of a file. Google Docs are exported as plain text.
    pub async fn fetch_text(&self, file: &DriveFile) -> Result<String, Error> {
        let token = self.access_token().await?;
        let request = if file.mime_type.as_deref() == Some(GOOGLE_DOC_MIME) {
            self.http
                .get(format!(
                    "{}/drive/v3/files/{}/export",
                    self.api_hostname, file.id
                ))
                .query(&[("mimeType", "text/plain")])
        } else {
            self.http
                .get(format!("{}/drive/v3/files/{}", self.api_hostname, file.id))
                .query(&[("alt", "media")])
        };
        let res = request.bearer_auth(&token).send().await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("Drive fetch of {} failed: {} ({})", file.id, status, text);
        }
        Ok(text)
    }

    async fn create_file(&self, parent_id: &str, name: &str, mime_type: &str) -> Result<String, Error> {
        let token = self.access_token().await?;
        let res = self
            .http
            .post(format!("{}/drive/v3/files", self.api_hostname))
            .bearer_auth(&token)
            .json(&json!({
                "name": name,
                "parents": [parent_id],
                "mimeType": mime_type,
            }))
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("Drive create of {} failed: {} ({})", name, status, text);
        }
        let file: DriveFile = serde_json::from_str(&text)?;
        Ok(file.id)
    }

    async fn upload_content(&self, file_id: &str, content: &str, mime_type: &str) -> Result<(), Error> {
        let token = self.access_token().await?;
        let res = self
            .http
            .patch(format!(
                "{}/upload/drive/v3/files/{}",
                self.api_hostname, file_id
            ))
            .query(&[("uploadType", "media")])
            .bearer_auth(&token)
            .header("Content-Type", mime_type)
            .body(content.to_string())
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("Drive upload to {} failed: {} ({})", file_id, status, text);
        }
        Ok(())
    }

    /// Replace the content of the file named `name` under `parent_id`,
    /// creating it first when it doesn't exist. Returns the file id.
    pub async fn upsert_text_file(
        &self,
        parent_id: &str,
        name: &str,
        content: &str,
    ) -> Result<String, Error> {
        let existing = self.find_by_name(parent_id, name).await?;
        if existing.len() > 1 {
            tracing::warn!(
                "Found {} files named {} in folder {}, updating the first",
                existing.len(),
                name,
                parent_id
            );
        }
        let file_id = match existing.into_iter().next() {
            Some(file) => file.id,
            None => self.create_file(parent_id, name, "text/plain").await?,
        };
        self.upload_content(&file_id, content, "text/plain").await?;
        Ok(file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn test_escape_query_value() {
        assert_eq!(escape_query_value("case4"), "case4");
        assert_eq!(escape_query_value("it's"), "it\\'s");
        assert_eq!(escape_query_value("a\\b"), "a\\\\b");
    }

    #[tokio::test]
    async fn test_list_files() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::UrlEncoded(
                "q".into(),
                "'folder1' in parents and name contains 'case4' and trashed = false".into(),
            ))
            .match_header("authorization", "Bearer test_token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"files": [{"id": "f1", "name": "prompt_case4.txt", "mimeType": "text/plain"}]}"#,
            )
            .create();

        let client = DriveClient::with_access_token(&server.url(), "test_token");
        let files = client.list_files("folder1", "case4").await.unwrap();

        mock.assert();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "prompt_case4.txt");
    }

    #[tokio::test]
    async fn test_list_files_follows_pages() {
        let mut server = mockito::Server::new_async().await;
        // Created first so the follow-up request, which also matches
        // this one, is served by the more specific page two mock
        let page_one = server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"files": [{"id": "f1", "name": "a_case1.txt"}], "nextPageToken": "next-1"}"#)
            .expect(1)
            .create();
        let page_two = server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "next-1".into()))
            .with_status(200)
            .with_body(r#"{"files": [{"id": "f2", "name": "b_case1.txt"}]}"#)
            .expect(1)
            .create();

        let client = DriveClient::with_access_token(&server.url(), "t");
        let files = client.list_files("folder", "case1").await.unwrap();

        page_one.assert();
        page_two.assert();
        let ids: Vec<&str> = files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f2"]);
    }

    #[tokio::test]
    async fn test_list_files_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"error": {"message": "Unauthorized"}}"#)
            .create();

        let client = DriveClient::with_access_token(&server.url(), "bad_token");
        let result = client.list_files("folder", "case1").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_text_plain_and_doc() {
        let mut server = mockito::Server::new_async().await;
        let media = server
            .mock("GET", "/drive/v3/files/f1")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .with_status(200)
            .with_body("line one\nline two")
            .create();
        let export = server
            .mock("GET", "/drive/v3/files/d1/export")
            .match_query(Matcher::UrlEncoded("mimeType".into(), "text/plain".into()))
            .with_status(200)
            .with_body("from a doc")
            .create();

        let client = DriveClient::with_access_token(&server.url(), "t");
        let plain = DriveFile {
            id: "f1".into(),
            name: "a_case1.txt".into(),
            mime_type: Some("text/plain".into()),
        };
        let doc = DriveFile {
            id: "d1".into(),
            name: "b_case1".into(),
            mime_type: Some(GOOGLE_DOC_MIME.into()),
        };

        assert_eq!(client.fetch_text(&plain).await.unwrap(), "line one\nline two");
        assert_eq!(client.fetch_text(&doc).await.unwrap(), "from a doc");
        media.assert();
        export.assert();
    }

    #[tokio::test]
    async fn test_upsert_creates_when_missing() {
        let mut server = mockito::Server::new_async().await;
        let find = server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"files": []}"#)
            .create();
        let create = server
            .mock("POST", "/drive/v3/files")
            .match_body(Matcher::PartialJson(json!({
                "name": "7_01_02_2025_case4.txt",
                "parents": ["out"]
            })))
            .with_status(200)
            .with_body(r#"{"id": "new1", "name": "7_01_02_2025_case4.txt"}"#)
            .create();
        let upload = server
            .mock("PATCH", "/upload/drive/v3/files/new1")
            .match_query(Matcher::UrlEncoded("uploadType".into(), "media".into()))
            .match_body("hello")
            .with_status(200)
            .with_body(r#"{"id": "new1"}"#)
            .create();

        let client = DriveClient::with_access_token(&server.url(), "t");
        let id = client
            .upsert_text_file("out", "7_01_02_2025_case4.txt", "hello")
            .await
            .unwrap();

        assert_eq!(id, "new1");
        find.assert();
        create.assert();
        upload.assert();
    }

    #[tokio::test]
    async fn test_upsert_updates_existing() {
        let mut server = mockito::Server::new_async().await;
        let _find = server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"files": [{"id": "old1", "name": "k.txt"}]}"#)
            .create();
        let create = server
            .mock("POST", "/drive/v3/files")
            .expect(0)
            .create();
        let upload = server
            .mock("PATCH", "/upload/drive/v3/files/old1")
            .match_query(Matcher::Any)
            .match_body("second snapshot")
            .with_status(200)
            .create();

        let client = DriveClient::with_access_token(&server.url(), "t");
        let id = client
            .upsert_text_file("out", "k.txt", "second snapshot")
            .await
            .unwrap();

        assert_eq!(id, "old1");
        create.assert();
        upload.assert();
    }

    #[tokio::test]
    async fn test_refresh_token_is_cached() {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token": "fresh", "expires_in": 3600}"#)
            .expect(1)
            .create();
        let list = server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer fresh")
            .with_status(200)
            .with_body(r#"{"files": []}"#)
            .expect(2)
            .create();

        let config = AppConfig {
            google_api_hostname: server.url(),
            google_oauth_hostname: server.url(),
            google_client_id: Some("id".into()),
            google_client_secret: Some("secret".into()),
            google_refresh_token: Some("refresh".into()),
            ..crate::core::config::test_config()
        };
        let client = DriveClient::from_config(&config).unwrap();
        client.list_files("folder", "case1").await.unwrap();
        client.list_files("folder", "case2").await.unwrap();

        token.assert();
        list.assert();
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let config = AppConfig {
            google_client_id: None,
            ..crate::core::config::test_config()
        };
        match DriveClient::from_config(&config) {
            Err(StudyError::MissingCredential(key)) => {
                assert_eq!(key, "CASECHAT_GOOGLE_CLIENT_ID")
            }
            other => panic!("Expected MissingCredential, got {:?}", other),
        }
    }
}
