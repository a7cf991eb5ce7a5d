use crate::{
    audio::{AudioRole, TapStats},
    mux::{MuxOutcome, PendingJobs},
    video::VideoIntermediate,
};

use std::{
    fmt, fs,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use chrono::{DateTime, Local};
use uuid::Uuid;

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// No capture context.
    #[default]
    Idle,
    /// Frames flowing into the current segment.
    Capturing,
    /// Closing one segment and opening the next.
    Splitting,
    /// Stop requested; waiting for the capture thread to exit.
    Stopping,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Capturing => "capturing",
            SchedulerState::Splitting => "splitting",
            SchedulerState::Stopping => "stopping",
        })
    }
}

/// Final disposition of one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentResult {
    /// Encoded into the target path.
    Encoded {
        /// Final file size.
        bytes: u64,
    },
    /// Encode failed.
    Fallback {
        /// Raw video kept instead, if any.
        preserved: Option<PathBuf>,
        /// Encoder error message.
        error: String,
    },
    /// No frames were captured.
    Empty,
}

/// One line of the session's mux history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentReport {
    /// 1-based segment number.
    pub sequence: u32,
    /// Reserved final path.
    pub target: PathBuf,
    /// Frames captured into the segment.
    pub frames: u64,
    /// Playback duration of the captured frames.
    pub duration: Duration,
    /// What happened.
    pub result: SegmentResult,
}

impl SegmentReport {
    pub(crate) fn new(sequence: u32, target: PathBuf, video: &VideoIntermediate, outcome: &MuxOutcome) -> Self {
        let result = match outcome {
            MuxOutcome::Encoded { bytes, .. } => SegmentResult::Encoded { bytes: *bytes },
            MuxOutcome::Fallback { preserved, error } => SegmentResult::Fallback {
                preserved: preserved.clone(),
                error: error.to_string(),
            },
            MuxOutcome::Empty => SegmentResult::Empty,
        };
        Self {
            sequence,
            target,
            frames: video.frames,
            duration: video.duration,
            result,
        }
    }
}

/// Mutable session bookkeeping, owned by the scheduler behind a mutex.
#[derive(Debug, Default)]
pub struct SessionState {
    pub(crate) state: SchedulerState,
    pub(crate) session_id: Option<Uuid>,
    pub(crate) started_at: Option<DateTime<Local>>,
    pub(crate) segment_started: Option<Instant>,
    pub(crate) current_segment: u32,
    pub(crate) segments_captured: u32,
    pub(crate) current_intermediate: Option<PathBuf>,
    pub(crate) current_intermediate_bytes: u64,
    pub(crate) audio_sources: Vec<(AudioRole, String, Arc<TapStats>)>,
    pub(crate) last_output: Option<(PathBuf, u64)>,
    pub(crate) last_error: Option<String>,
    pub(crate) completed: Vec<SegmentReport>,
}

impl SessionState {
    /// Reset per-session fields for a new session. History is kept.
    pub(crate) fn begin_session(&mut self, session_id: Uuid) {
        self.state = SchedulerState::Capturing;
        self.session_id = Some(session_id);
        self.started_at = Some(Local::now());
        self.segment_started = None;
        self.current_segment = 0;
        self.segments_captured = 0;
        self.current_intermediate = None;
        self.current_intermediate_bytes = 0;
        self.audio_sources.clear();
        self.last_error = None;
    }

    /// Back to idle; clears live fields only.
    pub(crate) fn end_session(&mut self) {
        self.state = SchedulerState::Idle;
        self.segment_started = None;
        self.current_intermediate = None;
        self.current_intermediate_bytes = 0;
        self.audio_sources.clear();
    }
}

/// Live statistics of one audio source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSourceStatus {
    /// Loopback or microphone.
    pub role: AudioRole,
    /// Device name.
    pub device: String,
    /// Sample bytes written this session.
    pub bytes_written: u64,
    /// Chunks dropped to overflow.
    pub dropped_chunks: u64,
    /// Whether the stream has failed.
    pub failed: bool,
}

/// Read-only snapshot of the session for status display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Lifecycle state.
    pub state: SchedulerState,
    /// Current or last session.
    pub session_id: Option<Uuid>,
    /// When the session began.
    pub started_at: Option<DateTime<Local>>,
    /// Time spent in the current segment.
    pub segment_elapsed: Duration,
    /// Current 1-based segment number; 0 before the first.
    pub current_segment: u32,
    /// Segments finalized and handed to the muxer.
    pub segments_captured: u32,
    /// Segments submitted but not yet muxed.
    pub pending_mux: usize,
    /// Most recent successful output and its size.
    pub last_output: Option<(PathBuf, u64)>,
    /// Video intermediate being written.
    pub current_intermediate: Option<PathBuf>,
    /// Bytes written to it so far.
    pub current_intermediate_bytes: u64,
    /// Audio taps running this session.
    pub audio_sources: Vec<AudioSourceStatus>,
    /// Fatal error that ended the last session.
    pub last_error: Option<String>,
    /// Every finished segment, in completion order.
    pub completed: Vec<SegmentReport>,
}

impl SessionStatus {
    /// Whether a session is running.
    pub fn is_active(&self) -> bool {
        self.state != SchedulerState::Idle
    }

    /// Size of the most recent output, read from disk.
    pub fn last_output_size_on_disk(&self) -> Option<u64> {
        let (path, _) = self.last_output.as_ref()?;
        fs::metadata(path).ok().map(|m| m.len())
    }
}

/// Cloneable read-only view of a scheduler's session.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    state: Arc<Mutex<SessionState>>,
    pending: Arc<PendingJobs>,
}

impl StatusHandle {
    pub(crate) fn new(state: Arc<Mutex<SessionState>>, pending: Arc<PendingJobs>) -> Self {
        Self { state, pending }
    }

    /// Take a snapshot.
    pub fn snapshot(&self) -> SessionStatus {
        let pending_mux = self.pending.count();
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        SessionStatus {
            state: state.state,
            session_id: state.session_id,
            started_at: state.started_at,
            segment_elapsed: state
                .segment_started
                .map(|t| t.elapsed())
                .unwrap_or_default(),
            current_segment: state.current_segment,
            segments_captured: state.segments_captured,
            pending_mux,
            last_output: state.last_output.clone(),
            current_intermediate: state.current_intermediate.clone(),
            current_intermediate_bytes: state.current_intermediate_bytes,
            audio_sources: state
                .audio_sources
                .iter()
                .map(|(role, device, stats)| AudioSourceStatus {
                    role: *role,
                    device: device.clone(),
                    bytes_written: stats.bytes_written(),
                    dropped_chunks: stats.dropped_chunks(),
                    failed: stats.failed(),
                })
                .collect(),
            last_error: state.last_error.clone(),
            completed: state.completed.clone(),
        }
    }
}
