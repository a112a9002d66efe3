use tokio_rusqlite::Connection;

use crate::core::AppConfig;
use crate::study::prompt::{BoxedPromptStore, store_from_config};
use crate::study::transcript::{BoxedTranscriptSink, sinks_from_config};
use crate::study::{CaseAssigner, DelayPolicy, StudyError};

pub struct AppState {
    pub db: Connection,
    pub config: AppConfig,
    pub assigner: CaseAssigner,
    pub delay: DelayPolicy,
    pub prompts: BoxedPromptStore,
    pub sinks: Vec<BoxedTranscriptSink>,
}

impl AppState {
    /// Builds the state from configuration. Fails when a Drive folder
    /// is configured without Google credentials.
    pub fn new(db: Connection, config: AppConfig) -> Result<Self, StudyError> {
        let prompts = store_from_config(&config)?;
        let sinks = sinks_from_config(&config)?;
        Ok(Self::with_stores(db, config, prompts, sinks))
    }

    pub fn with_stores(
        db: Connection,
        config: AppConfig,
        prompts: BoxedPromptStore,
        sinks: Vec<BoxedTranscriptSink>,
    ) -> Self {
        Self {
            assigner: CaseAssigner::from_config(&config),
            delay: DelayPolicy::from_config(&config),
            db,
            config,
            prompts,
            sinks,
        }
    }
}
