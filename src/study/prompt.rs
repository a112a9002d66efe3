//! Locating the system prompt for a case.
//!
//! Prompts come either from a store keyed by case, where a document
//! belongs to case N when its name contains `case<N>`, or from a set of
//! documents the participant uploaded, in which case one is picked at
//! random.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Error, Result};
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::case::Case;
use super::error::StudyError;
use super::personalize::replace_tags;
use super::session::Participant;
use crate::core::AppConfig;
use crate::google::drive::{DriveClient, DriveFile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptItem {
    pub id: String,
    pub name: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedDocument {
    pub name: String,
    pub content: String,
}

/// A searchable collection of prompt documents.
#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Documents whose name contains `fragment`.
    async fn list(&self, fragment: &str) -> Result<Vec<PromptItem>, Error>;
    async fn fetch(&self, item: &PromptItem) -> Result<String, Error>;
}

pub type BoxedPromptStore = Arc<dyn PromptStore>;

pub enum PromptSource<'a> {
    Store(&'a dyn PromptStore),
    Uploaded(&'a [UploadedDocument]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrompt {
    /// Name of the document the lines were read from
    pub source: String,
    pub lines: Vec<String>,
}

/// True when `name` contains `case<N>` and the match is not the prefix
/// of a longer number, so `case1` does not match `case12`.
pub fn matches_case(name: &str, case: Case) -> bool {
    let needle = case.to_string();
    name.match_indices(&needle).any(|(idx, _)| {
        !name[idx + needle.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    })
}

fn split_lines(content: &str) -> Vec<String> {
    content.lines().map(str::to_string).collect()
}

/// Picks the prompt document for `case` from `store` and returns its
/// lines unpersonalized. With several candidates the first by name wins.
pub async fn find_case_prompt(
    store: &dyn PromptStore,
    case: Case,
) -> Result<ResolvedPrompt, StudyError> {
    let mut items: Vec<PromptItem> = store
        .list(&case.to_string())
        .await
        .map_err(|e| StudyError::PromptStore(e.to_string()))?
        .into_iter()
        .filter(|item| matches_case(&item.name, case))
        .collect();
    items.sort_by(|a, b| a.name.cmp(&b.name));

    let Some(item) = items.first() else {
        return Err(StudyError::PromptNotFound(case.label()));
    };
    if items.len() > 1 {
        tracing::warn!(
            "{} prompt documents match {}, using {}",
            items.len(),
            case,
            item.name
        );
    }

    let content = store
        .fetch(item)
        .await
        .map_err(|e| StudyError::PromptStore(e.to_string()))?;
    Ok(ResolvedPrompt {
        source: item.name.clone(),
        lines: split_lines(&content),
    })
}

/// Uniformly picks one of the uploaded documents.
pub fn choose_uploaded(docs: &[UploadedDocument]) -> Result<ResolvedPrompt, StudyError> {
    let doc = docs
        .choose(&mut rand::rng())
        .ok_or(StudyError::NoUploadedPrompts)?;
    Ok(ResolvedPrompt {
        source: doc.name.clone(),
        lines: split_lines(&doc.content),
    })
}

/// Resolves the prompt from `source` and substitutes the participant's
/// attributes into it.
pub async fn resolve_prompt(
    source: PromptSource<'_>,
    case: Case,
    participant: &Participant,
) -> Result<ResolvedPrompt, StudyError> {
    let resolved = match source {
        PromptSource::Store(store) => find_case_prompt(store, case).await?,
        PromptSource::Uploaded(docs) => choose_uploaded(docs)?,
    };
    tracing::info!("Resolved prompt {} for {}", resolved.source, case);
    Ok(ResolvedPrompt {
        lines: replace_tags(
            &resolved.lines,
            participant.display_name.as_deref(),
            participant.gender.as_deref(),
        ),
        source: resolved.source,
    })
}

/// The Drive folder when one is configured, otherwise the local prompts
/// directory.
pub fn store_from_config(config: &AppConfig) -> Result<BoxedPromptStore, StudyError> {
    match &config.drive_prompt_folder_id {
        Some(folder_id) => {
            let client = Arc::new(DriveClient::from_config(config)?);
            Ok(Arc::new(DrivePromptStore::new(client, folder_id)))
        }
        None => Ok(Arc::new(DirPromptStore::new(&config.prompts_path))),
    }
}

/// Prompt documents kept as files in a local directory.
pub struct DirPromptStore {
    dir: PathBuf,
}

impl DirPromptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl PromptStore for DirPromptStore {
    async fn list(&self, fragment: &str) -> Result<Vec<PromptItem>, Error> {
        let mut items = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.contains(fragment) {
                items.push(PromptItem {
                    id: entry.path().to_string_lossy().to_string(),
                    name,
                    mime_type: None,
                });
            }
        }
        Ok(items)
    }

    async fn fetch(&self, item: &PromptItem) -> Result<String, Error> {
        Ok(tokio::fs::read_to_string(&item.id).await?)
    }
}

/// Prompt documents in a Drive folder.
pub struct DrivePromptStore {
    client: Arc<DriveClient>,
    folder_id: String,
}

impl DrivePromptStore {
    pub fn new(client: Arc<DriveClient>, folder_id: &str) -> Self {
        Self {
            client,
            folder_id: folder_id.to_string(),
        }
    }
}

#[async_trait]
impl PromptStore for DrivePromptStore {
    async fn list(&self, fragment: &str) -> Result<Vec<PromptItem>, Error> {
        let files = self.client.list_files(&self.folder_id, fragment).await?;
        Ok(files
            .into_iter()
            .map(|f| PromptItem {
                id: f.id,
                name: f.name,
                mime_type: f.mime_type,
            })
            .collect())
    }

    async fn fetch(&self, item: &PromptItem) -> Result<String, Error> {
        let file = DriveFile {
            id: item.id.clone(),
            name: item.name.clone(),
            mime_type: item.mime_type.clone(),
        };
        self.client.fetch_text(&file).await
    }
}
