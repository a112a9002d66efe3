use std::path::PathBuf;

use anyhow::{Result, anyhow};

use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::study::db::{find_session, list_sessions};
use crate::study::transcript::build;
use crate::study::LogIdentifier;

pub async fn run(
    log_id: Option<String>,
    list: bool,
    out: Option<PathBuf>,
    config: &AppConfig,
) -> Result<()> {
    let db = async_db(&config.db_path).await?;

    if list {
        for id in list_sessions(&db).await? {
            println!("{}", id);
        }
        return Ok(());
    }

    let log_id = log_id.ok_or(anyhow!("Missing value for \"--log-id\" or \"--list\""))?;
    let log_id = LogIdentifier::from_raw(&log_id);
    let session = find_session(&db, &log_id)
        .await?
        .ok_or(anyhow!("No session found for {}", log_id))?;
    let content = build(session.prompt.as_deref().unwrap_or_default(), &session.turns);

    match out {
        Some(path) => {
            tokio::fs::write(&path, content).await?;
            println!("Wrote {}", path.display());
        }
        None => println!("{}", content),
    }

    Ok(())
}
