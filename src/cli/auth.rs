use anyhow::{Result, anyhow};
use std::io::{self, Write};

use crate::core::AppConfig;
use crate::google::oauth::{consent_url, exchange_code_for_token};

fn prompt_line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_owned())
}

/// Walks through the Drive consent screen and prints the refresh token
/// to put in CASECHAT_GOOGLE_REFRESH_TOKEN.
pub async fn run(config: &AppConfig) -> Result<()> {
    let client_id = config
        .google_client_id
        .clone()
        .ok_or(anyhow!("Set CASECHAT_GOOGLE_CLIENT_ID in your environment"))?;
    let client_secret = config
        .google_client_secret
        .clone()
        .ok_or(anyhow!("Set CASECHAT_GOOGLE_CLIENT_SECRET in your environment"))?;
    let redirect_uri = std::env::var("CASECHAT_GOOGLE_REDIRECT_URI")
        .unwrap_or_else(|_| "urn:ietf:wg:oauth:2.0:oob".to_string());

    println!(
        "\nPlease open the following URL in your browser and authorize access:\n\n{}\n",
        consent_url(&client_id, &redirect_uri)
    );
    let code = prompt_line("Paste the authorization code shown by Google here: ")?;

    let token = exchange_code_for_token(
        &config.google_oauth_hostname,
        &client_id,
        &client_secret,
        &code,
        &redirect_uri,
    )
    .await?;
    let refresh_token = token
        .refresh_token
        .ok_or(anyhow!("No refresh token in response"))?;

    println!("\nCASECHAT_GOOGLE_REFRESH_TOKEN={}", refresh_token);
    Ok(())
}
