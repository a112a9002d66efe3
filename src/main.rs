use anyhow::Result;
use casechat::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
