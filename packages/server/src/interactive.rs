//! Interactive mode for the server.
//!
//! Prompts the user for a settings file, bind address, and port before
//! starting the server.

use std::path::PathBuf;

use dialoguer::{Confirm, Input};
use wildfire_risk_reference::{Settings, settings::config_path};

use crate::ServerError;

/// Runs the server in interactive mode, prompting for configuration.
///
/// Asks for a settings file (defaulting to `WILDFIRE_RISK_CONFIG` or
/// `wildfire_risk.toml`), then for a bind address and port prefilled from
/// that file, and delegates to [`super::run_server`].
///
/// # Errors
///
/// Returns a [`ServerError`] if the settings or reference data fail to
/// load, or the server fails to start.
#[allow(clippy::future_not_send)]
pub async fn run() -> Result<(), ServerError> {
    println!("Wildfire Risk Server");
    println!();

    let default_path = config_path(None).display().to_string();
    let path: String = Input::new()
        .with_prompt("Settings file")
        .default(default_path.clone())
        .interact_text()
        .unwrap_or_else(|_| default_path.clone());

    // Keeping the offered default stays lenient about a missing file.
    let explicit = (path != default_path).then(|| PathBuf::from(path));
    let mut settings = Settings::discover(explicit.as_deref())?;

    settings.server.bind_addr = Input::new()
        .with_prompt("Bind address")
        .default(settings.server.bind_addr.clone())
        .interact_text()
        .unwrap_or_else(|_| settings.server.bind_addr.clone());

    settings.server.port = Input::new()
        .with_prompt("Port")
        .default(settings.server.port)
        .interact_text()
        .unwrap_or(settings.server.port);

    if !Confirm::new()
        .with_prompt(format!(
            "Start server on {}:{}?",
            settings.server.bind_addr, settings.server.port
        ))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    super::run_server(settings).await
}
