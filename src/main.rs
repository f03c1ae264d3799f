/// Main entry point for the web shell server
use anyhow::Context;
use tracing::info;

use rs_webshell::AppState;
use rs_webshell::config::{ConfigLoader, init_logging};
use rs_webshell::server::{bind, run_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let dotenv = dotenvy::dotenv();

    // Load configuration
    let config = ConfigLoader::new()
        .load_config(None)
        .context("Failed to load configuration")?;

    // Initialize logging; the guard flushes file output on exit
    let _log_guard = init_logging(&config.logging).context("Failed to initialize logging")?;
    if let Ok(path) = dotenv {
        info!("Loaded environment from {:?}", path);
    }
    info!(shell = %config.shell.resolved_path().display(), "Configuration loaded");

    // Create application state with configuration
    let app_state = AppState::new(config);

    let listener = bind(&app_state).await.context("Failed to bind listener")?;
    run_server(listener, app_state).await.context("Server error")?;
    Ok(())
}
