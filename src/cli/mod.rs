use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod auth;
pub mod chat;
pub mod init;
pub mod serve;
pub mod transcript;

use crate::core::{AppConfig, BackendKind};

#[derive(Subcommand)]
enum Command {
    /// Create the storage directories and db schema
    Init {
        #[arg(long, action, default_value = "false")]
        db: bool,
    },
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Run a study session in the terminal
    Chat {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        gender: Option<String>,
        /// Pick the prompt at random from these files instead of the
        /// case keyed prompt store
        #[arg(long = "prompt-file")]
        prompt_files: Vec<PathBuf>,
        /// Override the configured completion backend
        #[arg(long, value_enum)]
        backend: Option<BackendKind>,
    },
    /// Print or save a stored transcript
    Transcript {
        /// Log identifier, e.g. 7_01_02_2025_case4
        #[arg(long)]
        log_id: Option<String>,
        /// List stored sessions instead
        #[arg(long, action, default_value = "false")]
        list: bool,
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Authorize Google Drive access and print the refresh token
    Auth {},
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    let mut config = AppConfig::default();

    // Handle each sub command
    match args.command {
        Some(Command::Init { db }) => {
            init::run(db, &config).await?;
        }
        Some(Command::Serve { host, port }) => {
            serve::run(host, port, config).await?;
        }
        Some(Command::Chat {
            user_id,
            name,
            gender,
            prompt_files,
            backend,
        }) => {
            if let Some(backend) = backend {
                config.backend = backend;
            }
            let participant = chat::ParticipantArgs {
                user_id,
                name,
                gender,
            };
            chat::run(participant, prompt_files, &config).await?;
        }
        Some(Command::Transcript { log_id, list, out }) => {
            transcript::run(log_id, list, out, &config).await?;
        }
        Some(Command::Auth {}) => {
            auth::run(&config).await?;
        }
        None => {}
    }

    Ok(())
}
