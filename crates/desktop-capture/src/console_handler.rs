//! Console input forwarding.
//!
//! Reads lines from stdin on a dedicated thread and turns them into
//! [`AppCommand`]s for the main application.

use crate::{AppCommand, AppResult};

use std::{
    io::{self, BufRead},
    thread,
};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Forwards console lines to the application as commands.
pub struct ConsoleHandler {
    command_tx: mpsc::Sender<AppCommand>,
}

impl ConsoleHandler {
    /// Create a handler sending on `command_tx`.
    pub fn new(command_tx: mpsc::Sender<AppCommand>) -> Self {
        Self { command_tx }
    }

    /// Start the reader thread.
    ///
    /// The thread is detached: a blocking stdin read cannot be interrupted,
    /// so it is left to end with the process. It exits by itself on EOF or
    /// once the application drops its receiver.
    pub fn spawn(self) -> AppResult<()> {
        thread::Builder::new()
            .name("console-input".to_string())
            .spawn(move || self.forward_lines(io::stdin().lock()))?;

        info!("Press Enter to start or stop recording, `s` for status, `q` to quit");
        Ok(())
    }

    /// Forward every recognised line of `input` until EOF or until the
    /// receiver is gone.
    pub fn forward_lines(&self, input: impl BufRead) {
        for line in input.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Console read failed, input disabled");
                    return;
                }
            };

            let Some(command) = AppCommand::from_console_line(&line) else {
                warn!(input = %line.trim(), "Unrecognised input");
                continue;
            };

            if self.command_tx.blocking_send(command).is_err() {
                debug!("Application gone, console reader exiting");
                return;
            }
        }
        debug!("Console input closed; Ctrl-C still stops the application");
    }
}
