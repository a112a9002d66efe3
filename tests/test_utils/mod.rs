//! Test utilities for integration tests
#![allow(dead_code)]

use std::fs;
use std::sync::{Arc, RwLock};

use axum::{Router, body::Body};
use tempfile::TempDir;

use casechat::api::AppState;
use casechat::api::app;
use casechat::core::db::async_db;
use casechat::core::db::initialize_db;
use casechat::core::{AppConfig, BackendKind};

pub const CASE4_PROMPT: &str = "Hello [NAME], you are [GENDER].\nKeep answers short.";

/// Temporary storage for one test. Dropping it removes the directory.
pub struct TestEnv {
    pub dir: TempDir,
    pub config: AppConfig,
}

impl TestEnv {
    pub fn transcript_path(&self, log_id: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.config.transcripts_path).join(format!("{}.txt", log_id))
    }

    pub fn write_prompt(&self, name: &str, content: &str) {
        fs::write(
            std::path::Path::new(&self.config.prompts_path).join(name),
            content,
        )
        .expect("Failed to write prompt");
    }

    pub fn transcript_files(&self) -> usize {
        fs::read_dir(&self.config.transcripts_path)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// Configuration pointing every backend at `openai_host` with a zero
/// delay window so delay-enabled cases don't sleep.
pub fn test_env(openai_host: &str) -> TestEnv {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path();
    for sub in ["db", "transcripts", "prompts"] {
        fs::create_dir_all(root.join(sub)).expect("Failed to create directory");
    }
    fs::write(root.join("prompts").join("prompt_case4.txt"), CASE4_PROMPT)
        .expect("Failed to write prompt");
    fs::write(root.join("prompts").join("prompt_case2.txt"), "Case two")
        .expect("Failed to write prompt");

    let config = AppConfig {
        storage_path: root.display().to_string(),
        db_path: root.join("db").display().to_string(),
        transcripts_path: root.join("transcripts").display().to_string(),
        prompts_path: root.join("prompts").display().to_string(),
        backend: BackendKind::OpenAi,
        openai_api_hostname: openai_host.to_string(),
        openai_api_key: Some(String::from("test-api-key")),
        openai_model: String::from("gpt-3.5-turbo"),
        anthropic_api_hostname: openai_host.to_string(),
        anthropic_api_key: Some(String::from("test-anthropic-key")),
        anthropic_model: String::from("claude-3-7-sonnet-20250219"),
        anthropic_max_tokens: 1024,
        case_count: 4,
        delay_cases: vec![3, 4],
        delay_min_secs: 0,
        delay_max_secs: 0,
        drive_prompt_folder_id: None,
        drive_transcript_folder_id: None,
        google_api_hostname: openai_host.to_string(),
        google_oauth_hostname: openai_host.to_string(),
        google_client_id: None,
        google_client_secret: None,
        google_refresh_token: None,
    };
    TestEnv { dir, config }
}

/// Creates a test application router backed by the env's directories.
pub async fn test_app(env: &TestEnv) -> Router {
    let db = async_db(&env.config.db_path)
        .await
        .expect("Failed to connect to async db");
    db.call(|conn| {
        initialize_db(conn).expect("Failed to migrate db");
        Ok(())
    })
    .await
    .unwrap();

    let app_state = AppState::new(db, env.config.clone()).expect("Failed to build app state");
    app(Arc::new(RwLock::new(app_state)))
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not utf-8")
}

/// Log identifier the server derives for `user_id` today.
pub fn todays_log_id(user_id: &str, case: u32) -> String {
    format!(
        "{}_{}_case{}",
        user_id,
        chrono::Local::now().date_naive().format("%d_%m_%Y"),
        case
    )
}

pub fn completion_body(text: &str) -> String {
    serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": text}}]
    })
    .to_string()
}
