use crate::{
    CaptureError, CoreResult,
    config::Resolution,
    video::{FrameSource, FrameSourceProvider, Grab, RawFrame},
};

use std::{
    panic::Location,
    sync::mpsc::{Receiver, TryRecvError},
    time::{Duration, Instant},
};

use error_location::ErrorLocation;
use image::RgbaImage;
use tracing::{debug, info, instrument, warn};
use xcap::{Frame, Monitor, VideoRecorder};

/// Consecutive snapshot failures tolerated before the display counts as lost.
pub(crate) const SNAPSHOT_LOSS_WINDOW: Duration = Duration::from_secs(3);

/// Captures the primary monitor through `xcap`.
///
/// `open` probes the platform's streaming recorder first and falls back to
/// per-tick screenshots when streaming is unsupported.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopFrameSourceProvider;

impl DesktopFrameSourceProvider {
    /// Create a provider for the primary monitor.
    pub fn new() -> Self {
        Self
    }
}

impl FrameSourceProvider for DesktopFrameSourceProvider {
    #[track_caller]
    #[instrument(skip(self), fields(target = %target))]
    fn open(&self, target: Resolution) -> CoreResult<Box<dyn FrameSource>> {
        let monitor = primary_monitor()?;

        match monitor.video_recorder() {
            Ok((recorder, frames)) => match recorder.start() {
                Ok(()) => {
                    info!(variant = "streaming", "Desktop capture opened");
                    return Ok(Box::new(StreamingSource {
                        monitor,
                        recorder,
                        frames,
                        target,
                        primed: false,
                    }));
                }
                Err(e) => warn!(error = %e, "Streaming capture refused to start, using snapshots"),
            },
            Err(e) => debug!(error = %e, "Streaming capture unsupported, using snapshots"),
        }

        // One probe grab so an unusable display fails the start, not the first tick.
        monitor
            .capture_image()
            .map_err(|e| CaptureError::CaptureUnavailable {
                reason: format!("Probe screenshot failed: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        info!(variant = "snapshot", "Desktop capture opened");
        Ok(Box::new(SnapshotSource {
            monitor,
            target,
            failing_since: None,
        }))
    }
}

#[track_caller]
fn primary_monitor() -> CoreResult<Monitor> {
    let monitors = Monitor::all().map_err(|e| CaptureError::CaptureUnavailable {
        reason: format!("Failed to enumerate monitors: {}", e),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let mut fallback = None;
    for monitor in monitors {
        if monitor.is_primary().unwrap_or(false) {
            return Ok(monitor);
        }
        fallback.get_or_insert(monitor);
    }

    fallback.ok_or_else(|| CaptureError::CaptureUnavailable {
        reason: "No monitors found".to_string(),
        location: ErrorLocation::from(Location::caller()),
    })
}

/// OS-pushed frames; `grab` keeps only the newest one queued.
struct StreamingSource {
    monitor: Monitor,
    recorder: VideoRecorder,
    frames: Receiver<Frame>,
    target: Resolution,
    /// Set once the OS has delivered at least one frame.
    primed: bool,
}

impl FrameSource for StreamingSource {
    #[track_caller]
    fn grab(&mut self) -> CoreResult<Grab> {
        let mut latest = None;
        loop {
            match self.frames.try_recv() {
                Ok(frame) => latest = Some(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(CaptureError::CaptureLost {
                        reason: "Screen recorder stopped delivering frames".to_string(),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
            }
        }

        if let Some(frame) = latest {
            self.primed = true;
            return Ok(match RgbaImage::from_raw(frame.width, frame.height, frame.raw) {
                Some(rgba) => Grab::Frame(RawFrame::normalized(rgba, self.target)),
                None => {
                    debug!(width = frame.width, height = frame.height, "Short frame buffer");
                    Grab::NotReady
                }
            });
        }

        // Streams often stay silent until the screen changes; seed with a snapshot.
        if !self.primed
            && let Ok(rgba) = self.monitor.capture_image()
        {
            self.primed = true;
            return Ok(Grab::Frame(RawFrame::normalized(rgba, self.target)));
        }

        Ok(Grab::NotReady)
    }

    fn variant(&self) -> &'static str {
        "streaming"
    }
}

impl Drop for StreamingSource {
    fn drop(&mut self) {
        if let Err(e) = self.recorder.stop() {
            warn!(error = %e, "Failed to stop screen recorder");
        }
    }
}

/// One screenshot per grab.
struct SnapshotSource {
    monitor: Monitor,
    target: Resolution,
    failing_since: Option<Instant>,
}

impl FrameSource for SnapshotSource {
    #[track_caller]
    fn grab(&mut self) -> CoreResult<Grab> {
        match self.monitor.capture_image() {
            Ok(rgba) => {
                self.failing_since = None;
                Ok(Grab::Frame(RawFrame::normalized(rgba, self.target)))
            }
            Err(e) => {
                let since = *self.failing_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= SNAPSHOT_LOSS_WINDOW {
                    return Err(CaptureError::CaptureLost {
                        reason: format!("Screenshots failing for {:?}: {}", since.elapsed(), e),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
                debug!(error = %e, "Screenshot failed");
                Ok(Grab::NotReady)
            }
        }
    }

    fn variant(&self) -> &'static str {
        "snapshot"
    }
}
