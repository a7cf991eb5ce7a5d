use std::time::Instant;

use uuid::Uuid;

/// Recording state as seen by the console driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// Not currently recording.
    Idle,
    /// A capture session is running.
    Recording {
        /// When recording started.
        started_at: Instant,
        /// Scheduler session ID for log correlation.
        session_id: Uuid,
    },
}
