use std::env;
use std::str::FromStr;

use anyhow::{Error, anyhow};

/// Which completion API answers participants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    #[value(name = "openai")]
    OpenAi,
    Anthropic,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(BackendKind::OpenAi),
            "anthropic" | "claude" => Ok(BackendKind::Anthropic),
            other => Err(anyhow!("Unknown backend: {}", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub transcripts_path: String,
    pub prompts_path: String,
    pub backend: BackendKind,
    pub openai_api_hostname: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub anthropic_api_hostname: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub anthropic_max_tokens: u32,
    pub case_count: u32,
    pub delay_cases: Vec<u32>,
    pub delay_min_secs: u64,
    pub delay_max_secs: u64,
    pub drive_prompt_folder_id: Option<String>,
    pub drive_transcript_folder_id: Option<String>,
    pub google_api_hostname: String,
    pub google_oauth_hostname: String,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_refresh_token: Option<String>,
}

/// Parses a comma separated list of case labels, skipping anything
/// that isn't a number.
pub fn parse_case_list(raw: &str) -> Vec<u32> {
    raw.split(',')
        .filter_map(|s| s.trim().parse::<u32>().ok())
        .collect()
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparseable value for {}: {}", key, v);
            default
        }),
        Err(_) => default,
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let storage_path = env::var("CASECHAT_STORAGE_PATH").unwrap_or("./".to_string());
        let storage_path = storage_path.trim_end_matches('/').to_string();
        let db_path = format!("{}/db", storage_path);
        let transcripts_path = format!("{}/transcripts", storage_path);
        let prompts_path = env::var("CASECHAT_PROMPTS_PATH")
            .unwrap_or_else(|_| format!("{}/prompts", storage_path));
        let backend = parsed_var("CASECHAT_BACKEND", BackendKind::OpenAi);
        let openai_api_hostname = env::var("CASECHAT_OPENAI_HOST")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let openai_model =
            env::var("CASECHAT_OPENAI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());
        let anthropic_api_hostname = env::var("CASECHAT_ANTHROPIC_HOST")
            .unwrap_or_else(|_| "https://api.anthropic.com".to_string());
        let anthropic_model = env::var("CASECHAT_ANTHROPIC_MODEL")
            .unwrap_or_else(|_| "claude-3-7-sonnet-20250219".to_string());
        let delay_cases = env::var("CASECHAT_DELAY_CASES")
            .map(|v| parse_case_list(&v))
            .unwrap_or_else(|_| vec![3, 4]);
        let google_api_hostname = env::var("CASECHAT_GOOGLE_API_HOST")
            .unwrap_or_else(|_| "https://www.googleapis.com".to_string());
        let google_oauth_hostname = env::var("CASECHAT_GOOGLE_OAUTH_HOST")
            .unwrap_or_else(|_| "https://oauth2.googleapis.com".to_string());

        Self {
            storage_path,
            db_path,
            transcripts_path,
            prompts_path,
            backend,
            openai_api_hostname,
            openai_api_key: optional_var("OPENAI_API_KEY"),
            openai_model,
            anthropic_api_hostname,
            anthropic_api_key: optional_var("ANTHROPIC_API_KEY"),
            anthropic_model,
            anthropic_max_tokens: parsed_var("CASECHAT_ANTHROPIC_MAX_TOKENS", 4096),
            case_count: parsed_var("CASECHAT_CASE_COUNT", 4),
            delay_cases,
            delay_min_secs: parsed_var("CASECHAT_DELAY_MIN_SECS", 10),
            delay_max_secs: parsed_var("CASECHAT_DELAY_MAX_SECS", 15),
            drive_prompt_folder_id: optional_var("CASECHAT_DRIVE_PROMPT_FOLDER_ID"),
            drive_transcript_folder_id: optional_var("CASECHAT_DRIVE_TRANSCRIPT_FOLDER_ID"),
            google_api_hostname,
            google_oauth_hostname,
            google_client_id: optional_var("CASECHAT_GOOGLE_CLIENT_ID"),
            google_client_secret: optional_var("CASECHAT_GOOGLE_CLIENT_SECRET"),
            google_refresh_token: optional_var("CASECHAT_GOOGLE_REFRESH_TOKEN"),
        }
    }
}

/// Fully offline configuration for unit tests; nothing is read from
/// the environment.
#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        storage_path: "./".to_string(),
        db_path: "./db".to_string(),
        transcripts_path: "./transcripts".to_string(),
        prompts_path: "./prompts".to_string(),
        backend: BackendKind::OpenAi,
        openai_api_hostname: "https://api.openai.com".to_string(),
        openai_api_key: Some("test-api-key".to_string()),
        openai_model: "gpt-3.5-turbo".to_string(),
        anthropic_api_hostname: "https://api.anthropic.com".to_string(),
        anthropic_api_key: Some("test-anthropic-key".to_string()),
        anthropic_model: "claude-3-7-sonnet-20250219".to_string(),
        anthropic_max_tokens: 4096,
        case_count: 4,
        delay_cases: vec![3, 4],
        delay_min_secs: 10,
        delay_max_secs: 15,
        drive_prompt_folder_id: None,
        drive_transcript_folder_id: None,
        google_api_hostname: "https://www.googleapis.com".to_string(),
        google_oauth_hostname: "https://oauth2.googleapis.com".to_string(),
        google_client_id: Some("test_client_id".to_string()),
        google_client_secret: Some("test_client_secret".to_string()),
        google_refresh_token: Some("test_refresh_token".to_string()),
    }
}
