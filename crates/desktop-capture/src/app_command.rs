/// Commands sent from the console reader to the main application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Start recording when idle, stop when recording.
    ToggleRecording,
    /// Log a full status line now.
    PrintStatus,
    /// Request application shutdown.
    Shutdown,
}

impl AppCommand {
    /// Map one line typed on the console to a command.
    ///
    /// An empty line (just Enter) toggles recording.
    pub fn from_console_line(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "" => Some(AppCommand::ToggleRecording),
            "s" | "status" => Some(AppCommand::PrintStatus),
            "q" | "quit" | "exit" => Some(AppCommand::Shutdown),
            _ => None,
        }
    }
}
