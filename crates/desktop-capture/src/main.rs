//! Desktop Capture: segmented screen and audio recording from the console.

mod app;
mod app_command;
mod config;
mod console_handler;
mod error;
mod recording_state;

pub(crate) use {
    app::App,
    app_command::AppCommand,
    console_handler::ConsoleHandler,
    error::{AppError, Result as AppResult},
    recording_state::RecordingState,
};

use crate::config::Config;

use tokio::sync::mpsc;
use tracing::error;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "desktop_capture=info,desktop_capture_core=info";

/// Application entry point.
fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {:?}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        error!("Config validation failed: {:?}", e);
        std::process::exit(1);
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {:?}", e);
            std::process::exit(1);
        }
    };

    let (command_tx, command_rx) = mpsc::channel(32);

    let result: AppResult<()> = rt.block_on(async {
        ConsoleHandler::new(command_tx).spawn()?;
        App::new(config, command_rx).run().await
    });

    drop(rt);

    if let Err(e) = result {
        error!(error = ?e, "App error");
        std::process::exit(1);
    }
}
