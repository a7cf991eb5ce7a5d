use crate::{AppCommand, AppError, AppResult, RecordingState, config::Config};

use desktop_capture_core::{
    CpalDeviceProvider, DesktopFrameSourceProvider, SegmentResult, SegmentScheduler, SessionStatus,
    StatusHandle,
};

use std::{
    panic::Location,
    sync::Arc,
    time::{Duration, Instant},
};

use error_location::ErrorLocation;
use tokio::{
    sync::{Mutex, mpsc},
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, instrument, warn};

/// How often the status line is refreshed.
pub(crate) const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Main application state.
///
/// Runs on the async runtime. Every scheduler call blocks (thread joins,
/// device opens), so each one is moved onto the blocking pool.
pub struct App {
    pub(crate) scheduler: Arc<Mutex<SegmentScheduler>>,
    pub(crate) status: StatusHandle,
    pub(crate) config: Config,
    pub(crate) recording: RecordingState,
    pub(crate) reported_segments: usize,
    pub(crate) command_rx: mpsc::Receiver<AppCommand>,
}

impl App {
    /// App recording the primary display, default audio devices and ffmpeg.
    pub fn new(config: Config, command_rx: mpsc::Receiver<AppCommand>) -> Self {
        let scheduler = SegmentScheduler::new(
            Arc::new(DesktopFrameSourceProvider::new()),
            Arc::new(CpalDeviceProvider::new()),
            Arc::new(config.encoder.runner()),
        );
        Self::with_scheduler(config, scheduler, command_rx)
    }

    /// App driving an already-built scheduler.
    pub fn with_scheduler(
        config: Config,
        scheduler: SegmentScheduler,
        command_rx: mpsc::Receiver<AppCommand>,
    ) -> Self {
        let status = scheduler.status_handle();
        Self {
            scheduler: Arc::new(Mutex::new(scheduler)),
            status,
            config,
            recording: RecordingState::Idle,
            reported_segments: 0,
            command_rx,
        }
    }

    /// Run the main application event loop until `q` or Ctrl-C.
    #[instrument(skip(self))]
    pub(crate) async fn run(mut self) -> AppResult<()> {
        info!(
            output_dir = ?self.config.capture.output_dir,
            resolution = %self.config.capture.resolution,
            fps = self.config.capture.frame_rate,
            "Desktop Capture starting"
        );

        let mut status_tick = tokio::time::interval(STATUS_INTERVAL);
        status_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        AppCommand::ToggleRecording => {
                            if let Err(e) = self.toggle_recording().await {
                                error!(error = %e, "Failed to toggle recording");
                            }
                        }
                        AppCommand::PrintStatus => self.print_status(),
                        AppCommand::Shutdown => {
                            info!("Shutdown requested");
                            break;
                        }
                    }
                }

                _ = status_tick.tick() => self.poll_status(),

                result = &mut ctrl_c => {
                    match result {
                        Ok(()) => info!("Ctrl-C received"),
                        Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
                    }
                    break;
                }
            }
        }

        self.shutdown().await
    }

    /// Start when idle, stop when recording.
    #[instrument(skip(self))]
    pub async fn toggle_recording(&mut self) -> AppResult<()> {
        match self.recording {
            RecordingState::Idle => self.start_recording().await,
            RecordingState::Recording { .. } => self.stop_recording().await,
        }
    }

    async fn start_recording(&mut self) -> AppResult<()> {
        let scheduler = Arc::clone(&self.scheduler);
        let capture = self.config.capture.clone();
        run_blocking(move || scheduler.blocking_lock().start(capture)).await??;

        let status = self.status.snapshot();
        let session_id = status.session_id.unwrap_or_default();
        self.recording = RecordingState::Recording {
            started_at: Instant::now(),
            session_id,
        };

        for source in &status.audio_sources {
            info!(role = %source.role, device = %source.device, "Recording audio");
        }
        if status.audio_sources.is_empty() {
            warn!("No audio device available, recording video only");
        }
        info!(session_id = %session_id, "Recording started");

        Ok(())
    }

    async fn stop_recording(&mut self) -> AppResult<()> {
        let scheduler = Arc::clone(&self.scheduler);
        run_blocking(move || scheduler.blocking_lock().stop()).await?;

        if let RecordingState::Recording {
            started_at,
            session_id,
        } = self.recording
        {
            info!(
                session_id = %session_id,
                duration_ms = started_at.elapsed().as_millis(),
                pending_mux = self.status.snapshot().pending_mux,
                "Recording stopped"
            );
        }
        self.recording = RecordingState::Idle;

        Ok(())
    }

    /// Periodic check: report finished segments and notice sessions that
    /// ended on their own.
    fn poll_status(&mut self) {
        let status = self.status.snapshot();
        self.report_segments(&status);

        if let RecordingState::Recording { session_id, .. } = self.recording
            && !status.is_active()
        {
            error!(
                session_id = %session_id,
                error = status.last_error.as_deref().unwrap_or("unknown"),
                "Recording ended unexpectedly"
            );
            self.recording = RecordingState::Idle;
            return;
        }

        if status.is_active() {
            debug!(
                state = %status.state,
                segment = status.current_segment,
                segment_secs = status.segment_elapsed.as_secs(),
                intermediate_bytes = status.current_intermediate_bytes,
                pending_mux = status.pending_mux,
                "Recording"
            );
        }
    }

    fn print_status(&self) {
        let status = self.status.snapshot();
        info!(
            state = %status.state,
            segment = status.current_segment,
            segments_captured = status.segments_captured,
            segment_secs = status.segment_elapsed.as_secs(),
            intermediate_bytes = status.current_intermediate_bytes,
            pending_mux = status.pending_mux,
            last_output = ?status.last_output.as_ref().map(|(path, _)| path),
            last_output_bytes = status.last_output_size_on_disk(),
            "Status"
        );
        for source in &status.audio_sources {
            info!(
                role = %source.role,
                device = %source.device,
                bytes = source.bytes_written,
                dropped_chunks = source.dropped_chunks,
                failed = source.failed,
                "Audio source"
            );
        }
    }

    fn report_segments(&mut self, status: &SessionStatus) {
        for report in status.completed.iter().skip(self.reported_segments) {
            match &report.result {
                SegmentResult::Encoded { bytes } => info!(
                    segment = report.sequence,
                    output = %report.target.display(),
                    bytes,
                    duration_secs = report.duration.as_secs_f64(),
                    "Segment saved"
                ),
                SegmentResult::Fallback { preserved, error } => warn!(
                    segment = report.sequence,
                    preserved = ?preserved,
                    error = %error,
                    "Segment could not be encoded"
                ),
                SegmentResult::Empty => debug!(segment = report.sequence, "Segment had no frames"),
            }
        }
        self.reported_segments = status.completed.len();
    }

    /// Stop, wait for queued encodes, then release everything.
    #[instrument(skip(self))]
    pub async fn shutdown(mut self) -> AppResult<()> {
        let pending = self.status.snapshot().pending_mux;
        if pending > 0 || !matches!(self.recording, RecordingState::Idle) {
            info!(pending_mux = pending, "Finishing recording and pending encodes");
        }

        let scheduler = Arc::clone(&self.scheduler);
        run_blocking(move || {
            let mut scheduler = scheduler.blocking_lock();
            scheduler.stop();
            scheduler.await_all_pending();
            scheduler.cleanup();
        })
        .await?;
        self.recording = RecordingState::Idle;

        let status = self.status.snapshot();
        self.report_segments(&status);
        info!("Desktop Capture shut down successfully");

        Ok(())
    }
}

/// Run a blocking scheduler call on the blocking pool.
async fn run_blocking<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::TaskFailed {
            reason: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
}
