//! Interactive Google Drive authorization.
//!
//! Prints the consent URL, reads the authorization code from the terminal
//! and writes the resulting refresh token where the service expects it.

use crate::config::Config;
use crate::upload::oauth::OAuthClient;
use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Input};
use std::io::{self, IsTerminal};
use std::path::Path;

pub async fn handle_auth_command(config_path: Option<&Path>) -> Result<()> {
    if !io::stdin().is_terminal() {
        bail!("`recwatch auth` needs an interactive terminal");
    }

    let config = Config::load(config_path)?;
    let client_path = config.drive.client_secret_path()?;
    let token_path = config.drive.token_path()?;

    let client = OAuthClient::load(&client_path).with_context(|| {
        format!(
            "Download an OAuth client (Desktop app) from the Google Cloud console and save it as {}",
            client_path.display()
        )
    })?;

    println!();
    println!("Google Drive Authorization");
    println!("==========================");
    println!();
    println!("Open this URL in a browser and grant access:");
    println!();
    println!("  {}", client.consent_url()?);
    println!();

    let code: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Authorization code")
        .interact_text()?;

    let http = reqwest::Client::new();
    let token = client.exchange_code(&http, &code).await?;
    token.save(&token_path)?;

    println!();
    println!("Token saved to {}", token_path.display());
    if config.drive.folder_id.trim().is_empty() {
        println!("Set drive.folder_id in the config file to enable uploads.");
    } else {
        println!("Restart the service to enable uploads.");
    }

    Ok(())
}
