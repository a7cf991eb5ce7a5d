use crate::{
    CaptureError, CoreResult,
    audio::{AudioDeviceProvider, AudioRole, AudioTap, PendingAudio},
    config::CaptureConfig,
    mux::{EncoderRunner, MuxJob, MuxPipeline, MuxSettings, MuxSubmitter, Muxer, PendingJobs},
    session::{OutputNamer, SchedulerState, SessionState, SessionStatus, StatusHandle},
    video::{FramePacer, FrameSource, FrameSourceProvider, Grab, SegmentWriter, VideoIntermediate},
};

use std::{
    fs,
    panic::Location,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use chrono::Local;
use error_location::ErrorLocation;
use tracing::{debug, error, info, info_span, instrument, warn};
use uuid::Uuid;

/// Longest single sleep of the capture loop, so stop stays prompt at low frame rates.
pub(crate) const MAX_IDLE_SLEEP: Duration = Duration::from_millis(50);

/// Audio devices a session tries to record, in track order.
const AUDIO_ROLES: [AudioRole; 2] = [AudioRole::Loopback, AudioRole::Microphone];

struct CaptureHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Orchestrates a recording session: the capture thread, the audio taps
/// and the background mux pipeline.
///
/// ```no_run
/// use desktop_capture_core::{
///     CaptureConfig, CoreResult, CpalDeviceProvider, DesktopFrameSourceProvider,
///     FfmpegRunner, SegmentScheduler,
/// };
///
/// use std::{sync::Arc, thread::sleep, time::Duration};
///
/// fn main() -> CoreResult<()> {
///     let mut scheduler = SegmentScheduler::new(
///         Arc::new(DesktopFrameSourceProvider::new()),
///         Arc::new(CpalDeviceProvider::new()),
///         Arc::new(FfmpegRunner::new()),
///     );
///
///     scheduler.start(CaptureConfig::new("recordings"))?;
///     sleep(Duration::from_secs(10));
///     scheduler.stop();
///     scheduler.await_all_pending();
///     scheduler.cleanup();
///     Ok(())
/// }
/// ```
pub struct SegmentScheduler {
    frames: Arc<dyn FrameSourceProvider>,
    audio: Arc<dyn AudioDeviceProvider>,
    muxer: Muxer,
    state: Arc<Mutex<SessionState>>,
    pending: Arc<PendingJobs>,
    pipeline: Option<MuxPipeline>,
    capture: Option<CaptureHandle>,
}

impl SegmentScheduler {
    /// Build an idle scheduler. Nothing is opened until [`start`](Self::start).
    pub fn new(
        frames: Arc<dyn FrameSourceProvider>,
        audio: Arc<dyn AudioDeviceProvider>,
        encoder: Arc<dyn EncoderRunner>,
    ) -> Self {
        Self {
            frames,
            audio,
            muxer: Muxer::new(encoder),
            state: Arc::new(Mutex::new(SessionState::default())),
            pending: Arc::new(PendingJobs::default()),
            pipeline: None,
            capture: None,
        }
    }

    /// Start a session.
    ///
    /// Atomic: when this fails no capture context, tap or thread is left
    /// running. Calling it while a session runs logs a warning and does nothing.
    #[track_caller]
    #[instrument(skip_all, fields(resolution = %config.resolution, fps = config.frame_rate))]
    pub fn start(&mut self, config: CaptureConfig) -> CoreResult<()> {
        self.reap_finished_capture();
        if self.capture.is_some() {
            warn!("Start requested while a session is running, ignoring");
            return Ok(());
        }

        config.validate()?;
        fs::create_dir_all(&config.output_dir)?;
        fs::create_dir_all(config.intermediate_dir())?;

        let pipeline = match self.pipeline.take() {
            Some(pipeline) => pipeline,
            None => MuxPipeline::spawn(
                self.muxer.clone(),
                config.mux_queue_capacity,
                Arc::clone(&self.state),
                Arc::clone(&self.pending),
            )?,
        };
        let submitter = pipeline.submitter();
        self.pipeline = Some(pipeline);
        let submitter = submitter?;

        let session_id = Uuid::new_v4();
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::sync_channel::<CoreResult<()>>(1);

        let launch = CaptureLaunch {
            session_id,
            config,
            frames: Arc::clone(&self.frames),
            audio: Arc::clone(&self.audio),
            submitter,
            state: Arc::clone(&self.state),
            stop: Arc::clone(&stop),
        };

        let thread = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || launch.run(ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(%session_id, "Recording started");
                self.capture = Some(CaptureHandle { stop, thread });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                error!(error = %e, "Recording failed to start");
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(CaptureError::CaptureUnavailable {
                    reason: "capture thread exited during start".to_string(),
                    location: ErrorLocation::from(Location::caller()),
                })
            }
        }
    }

    /// Stop capturing and submit the final segment. No-op when idle.
    ///
    /// Returns once frame capture has ceased and the audio taps have closed
    /// their files; the final segment is queued even when the mux queue is
    /// full. Encodes continue in the background until
    /// [`await_all_pending`](Self::await_all_pending).
    #[instrument(skip(self))]
    pub fn stop(&mut self) {
        let Some(capture) = self.capture.take() else {
            debug!("Stop requested while idle, ignoring");
            return;
        };

        capture.stop.store(true, Ordering::Release);
        if capture.thread.join().is_err() {
            error!("Capture thread panicked");
            self.lock_state().end_session();
        }
        info!(pending_mux = self.pending.count(), "Recording stopped");
    }

    /// Block until every submitted segment has been muxed. No timeout.
    #[instrument(skip(self))]
    pub fn await_all_pending(&self) {
        self.pending.wait_idle();
        debug!("All mux jobs finished");
    }

    /// Release the capture context, audio and mux worker.
    ///
    /// Stops and drains first if a session is still running.
    #[instrument(skip(self))]
    pub fn cleanup(&mut self) {
        self.stop();
        self.await_all_pending();
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.shutdown();
        }
        info!("Capture resources released");
    }

    /// Whether a session is running.
    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    /// Snapshot of the session.
    pub fn status(&self) -> SessionStatus {
        self.status_handle().snapshot()
    }

    /// Read-only handle for status polling from other threads.
    pub fn status_handle(&self) -> StatusHandle {
        StatusHandle::new(Arc::clone(&self.state), Arc::clone(&self.pending))
    }

    /// Join a capture thread that ended by itself after a fatal error.
    fn reap_finished_capture(&mut self) {
        if self
            .capture
            .as_ref()
            .is_some_and(|capture| capture.thread.is_finished())
        {
            self.stop();
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for SegmentScheduler {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Everything the capture thread needs, moved onto it at start.
struct CaptureLaunch {
    session_id: Uuid,
    config: CaptureConfig,
    frames: Arc<dyn FrameSourceProvider>,
    audio: Arc<dyn AudioDeviceProvider>,
    submitter: MuxSubmitter,
    state: Arc<Mutex<SessionState>>,
    stop: Arc<AtomicBool>,
}

impl CaptureLaunch {
    fn run(self, ready: mpsc::SyncSender<CoreResult<()>>) {
        let span = info_span!("capture", session_id = %self.session_id);
        let _entered = span.enter();

        match self.open() {
            Ok((mut session, first)) => {
                let _ = ready.send(Ok(()));
                drop(ready);
                session.run(first);
            }
            Err(e) => {
                let _ = ready.send(Err(e));
            }
        }
    }

    /// Open the frame source, the first segment and the taps, in that order.
    fn open(self) -> CoreResult<(CaptureSession, OpenSegment)> {
        let Self {
            session_id,
            config,
            frames,
            audio,
            submitter,
            state,
            stop,
        } = self;

        let source = frames.open(config.resolution)?;
        let mut namer = OutputNamer::new(&config, Local::now());
        let first = OpenSegment::begin(1, &config, &mut namer)?;

        let mut taps = Vec::new();
        for role in AUDIO_ROLES {
            let Some(device) = audio.resolve(role) else {
                warn!(%role, "Audio device unavailable, recording without it");
                continue;
            };
            let sink = namer.audio_intermediate(role, 1);
            match AudioTap::start(device, role, sink, config.audio_chunk_frames) {
                Ok(tap) => taps.push(tap),
                Err(e) => warn!(%role, error = %e, "Audio device failed to open, recording without it"),
            }
        }

        {
            let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
            guard.begin_session(session_id);
            guard.audio_sources = taps
                .iter()
                .map(|tap| (tap.role(), tap.device_name().to_string(), tap.stats()))
                .collect();
            first.publish(&mut guard);
        }

        info!(
            frame_source = source.variant(),
            audio_tracks = taps.len(),
            splits = ?config.segment_duration,
            "Capture session opened"
        );

        let session = CaptureSession {
            session_id,
            settings: MuxSettings::from_config(&config),
            config,
            namer,
            source,
            taps,
            submitter,
            state,
            stop,
        };
        Ok((session, first))
    }
}

/// The segment currently being written.
struct OpenSegment {
    sequence: u32,
    writer: SegmentWriter,
    output: PathBuf,
    started: Instant,
}

impl OpenSegment {
    fn begin(sequence: u32, config: &CaptureConfig, namer: &mut OutputNamer) -> CoreResult<Self> {
        let writer = SegmentWriter::begin(
            namer.video_intermediate(sequence),
            config.resolution,
            config.frame_rate,
        )?;
        let output = namer.reserve_output(sequence);
        info!(segment = sequence, output = %output.display(), "Segment started");

        Ok(Self {
            sequence,
            writer,
            output,
            started: Instant::now(),
        })
    }

    fn publish(&self, state: &mut SessionState) {
        state.current_segment = self.sequence;
        state.segment_started = Some(self.started);
        state.current_intermediate = Some(self.writer.path().to_path_buf());
        state.current_intermediate_bytes = 0;
    }
}

/// How a closed segment enters the mux queue.
#[derive(Clone, Copy)]
enum Submission {
    /// Mid-session split: wait for room so capture cannot outrun the encoder.
    Backpressured,
    /// Last segment: never make stop wait on the encoder.
    Final,
}

/// Why the frame loop ended.
enum LoopExit {
    Stopped,
    Failed(CaptureError),
}

/// Capture-thread state for one session.
struct CaptureSession {
    session_id: Uuid,
    config: CaptureConfig,
    settings: MuxSettings,
    namer: OutputNamer,
    source: Box<dyn FrameSource>,
    taps: Vec<AudioTap>,
    submitter: MuxSubmitter,
    state: Arc<Mutex<SessionState>>,
    stop: Arc<AtomicBool>,
}

impl CaptureSession {
    fn run(&mut self, first: OpenSegment) {
        let mut segment = first;
        // Segment 1 is timed from its first frame, not from before the taps opened.
        segment.started = Instant::now();
        segment.publish(&mut self.lock_state());
        let mut pacer = FramePacer::new(self.config.frame_rate);

        let (last, exit) = loop {
            if self.stop.load(Ordering::Acquire) {
                break (Some(segment), LoopExit::Stopped);
            }

            if let Some(limit) = self.config.segment_duration
                && segment.started.elapsed() >= limit
            {
                segment = match self.split(segment) {
                    Ok(next) => next,
                    Err(e) => break (None, LoopExit::Failed(e)),
                };
                continue;
            }

            if let Some(wait) = pacer.time_until_due(Instant::now()) {
                thread::sleep(wait.min(MAX_IDLE_SLEEP));
                continue;
            }

            let written = match self.source.grab() {
                Ok(Grab::Frame(frame)) => segment.writer.write(frame),
                // Keep real-time duration; duplicates are elided at encode.
                Ok(Grab::NotReady) => segment.writer.repeat_last().map(|_| ()),
                Err(e) => break (Some(segment), LoopExit::Failed(e)),
            };
            pacer.advance();

            if let Err(e) = written {
                // The segment is cut short and the session carries on in a new one.
                error!(segment = segment.sequence, error = %e, "Segment write failed");
                self.lock_state().last_error = Some(e.to_string());
                segment = match self.split(segment) {
                    Ok(next) => next,
                    Err(e) => break (None, LoopExit::Failed(e)),
                };
                continue;
            }

            self.lock_state().current_intermediate_bytes = segment.writer.bytes_written();
        };

        self.finish(last, exit);
    }

    /// Close `segment`, rotate the taps and open the next one.
    fn split(&mut self, segment: OpenSegment) -> CoreResult<OpenSegment> {
        self.lock_state().state = SchedulerState::Splitting;

        let next_sequence = segment.sequence + 1;
        let audio = self
            .taps
            .iter()
            .map(|tap| tap.rotate(self.namer.audio_intermediate(tap.role(), next_sequence)))
            .collect();

        let video = close_writer(segment.writer);
        let next = OpenSegment::begin(next_sequence, &self.config, &mut self.namer);

        self.submit(segment.sequence, video, audio, segment.output, Submission::Backpressured);

        let next = next?;
        let mut state = self.lock_state();
        next.publish(&mut state);
        state.state = SchedulerState::Capturing;
        Ok(next)
    }

    /// Submit the last segment, stop the taps and go idle.
    ///
    /// `segment` is `None` when the next segment failed to open; the audio
    /// already recorded for it has no video to join and is discarded.
    fn finish(&mut self, segment: Option<OpenSegment>, exit: LoopExit) {
        self.lock_state().state = SchedulerState::Stopping;

        let audio: Vec<PendingAudio> = self.taps.drain(..).map(AudioTap::stop).collect();
        match segment {
            Some(segment) => {
                let video = close_writer(segment.writer);
                self.submit(segment.sequence, video, audio, segment.output, Submission::Final);
            }
            None => {
                for track in audio.into_iter().filter_map(PendingAudio::wait) {
                    let _ = fs::remove_file(&track.path);
                }
            }
        }

        let mut state = self.lock_state();
        if let LoopExit::Failed(e) = exit {
            error!(error = %e, "Capture session ended by error");
            state.last_error = Some(e.to_string());
        }
        state.end_session();
        info!(segments = state.segments_captured, "Capture session closed");
    }

    fn submit(
        &self,
        sequence: u32,
        video: VideoIntermediate,
        audio: Vec<PendingAudio>,
        output: PathBuf,
        mode: Submission,
    ) {
        let job = MuxJob {
            session_id: self.session_id,
            sequence,
            video,
            audio,
            output,
            settings: self.settings.clone(),
        };

        let queued = match mode {
            Submission::Backpressured => self.submitter.submit(job),
            Submission::Final => self.submitter.submit_final(job),
        };
        match queued {
            Ok(()) => {
                self.lock_state().segments_captured += 1;
                debug!(segment = sequence, "Segment queued for mux");
            }
            Err(e) => {
                error!(segment = sequence, error = %e, "Segment could not be queued");
                self.lock_state().last_error = Some(e.to_string());
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Finalize a writer. A failed close still yields a job so the mux can
/// decide between encoding and preserving what reached the disk.
fn close_writer(writer: SegmentWriter) -> VideoIntermediate {
    let path = writer.path().to_path_buf();
    let frames = writer.frames();
    let frame_rate = writer.frame_rate();

    writer.finalize().unwrap_or_else(|e| {
        error!(path = %path.display(), error = %e, "Segment intermediate did not close cleanly");
        VideoIntermediate {
            path,
            frames,
            duration: Duration::from_secs_f64(frames as f64 / f64::from(frame_rate.max(1))),
        }
    })
}
