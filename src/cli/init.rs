use anyhow::{Result, anyhow};
use std::fs;

use crate::core::AppConfig;
use crate::core::db::{async_db, initialize_db};

pub async fn run(db: bool, config: &AppConfig) -> Result<()> {
    if !db {
        return Err(anyhow!("Missing value for init \"--db\""));
    }

    println!("Initializing storage...");
    for dir in [
        &config.db_path,
        &config.transcripts_path,
        &config.prompts_path,
    ] {
        fs::create_dir_all(dir)
            .unwrap_or_else(|err| println!("Ignoring create of {} failed: {}", dir, err));
    }

    let db = async_db(&config.db_path).await?;
    db.call(|conn| Ok(initialize_db(conn)?)).await?;
    println!("Finished initializing db at {}", config.db_path);

    Ok(())
}
