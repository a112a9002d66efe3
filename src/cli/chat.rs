use std::path::PathBuf;

use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::core::AppConfig;
use crate::core::db::{async_db, initialize_db};
use crate::study::prompt::{BoxedPromptStore, store_from_config};
use crate::study::transcript::sinks_from_config;
use crate::study::{
    Backend, CaseAssigner, DelayPolicy, Participant, PromptSource, UploadedDocument, open_session,
    take_turn,
};

pub struct ParticipantArgs {
    pub user_id: String,
    pub name: Option<String>,
    pub gender: Option<String>,
}

async fn read_prompt_files(paths: &[PathBuf]) -> Result<Vec<UploadedDocument>> {
    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt file {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        docs.push(UploadedDocument { name, content });
    }
    Ok(docs)
}

pub async fn run(args: ParticipantArgs, prompt_files: Vec<PathBuf>, config: &AppConfig) -> Result<()> {
    let participant = Participant::new(
        Some(args.user_id.as_str()),
        args.name.as_deref(),
        args.gender.as_deref(),
    )?;
    let backend = Backend::from_config(config)?;
    let assigner = CaseAssigner::from_config(config);
    let delay = DelayPolicy::from_config(config);
    let sinks = sinks_from_config(config)?;

    std::fs::create_dir_all(&config.db_path)?;
    let db = async_db(&config.db_path).await?;
    db.call(|conn| Ok(initialize_db(conn)?)).await?;

    let uploaded = read_prompt_files(&prompt_files).await?;
    let store: Option<BoxedPromptStore> = if uploaded.is_empty() {
        Some(store_from_config(config)?)
    } else {
        None
    };
    let source = match &store {
        Some(store) => PromptSource::Store(&**store),
        None => PromptSource::Uploaded(&uploaded),
    };

    let mut session = open_session(
        &db,
        &assigner,
        participant,
        chrono::Local::now().date_naive(),
        source,
    )
    .await?;

    if let Some(log_id) = &session.log_id {
        println!("Session {} ({})", log_id, backend.model());
    }
    for turn in &session.turns {
        println!("{}: {}", turn.role, turn.content);
    }

    let mut rl = DefaultEditor::new()?;
    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let outcome = take_turn(
                    &db,
                    &mut session,
                    &assigner,
                    &backend,
                    &delay,
                    &sinks,
                    &line,
                )
                .await?;
                if let Some(err) = &outcome.error {
                    eprintln!("{}", err);
                }
                for err in &outcome.store_errors {
                    eprintln!("{}", err);
                }
                println!("{}", outcome.reply);
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_prompt_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("friendly.txt");
        std::fs::write(&path, "Be kind to [NAME]").unwrap();

        let docs = read_prompt_files(&[path]).await.unwrap();
        assert_eq!(
            docs,
            vec![UploadedDocument {
                name: "friendly.txt".into(),
                content: "Be kind to [NAME]".into(),
            }]
        );

        let missing = read_prompt_files(&[dir.path().join("nope.txt")]).await;
        assert!(missing.is_err());
    }
}
