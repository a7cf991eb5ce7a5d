use crate::{
    CaptureError, CoreResult,
    config::Resolution,
    video::RawFrame,
};

use std::{
    fs::File,
    io::{BufWriter, Write},
    panic::Location,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use error_location::ErrorLocation;
use image::{ExtendedColorType, codecs::jpeg::JpegEncoder};
use tracing::{debug, instrument};

/// JPEG quality of intermediate frames.
pub(crate) const INTERMEDIATE_JPEG_QUALITY: u8 = 90;

/// A finished video intermediate, ready to hand to the muxer.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoIntermediate {
    /// Motion-JPEG elementary stream on disk.
    pub path: PathBuf,
    /// Frames written, repeats included.
    pub frames: u64,
    /// Playback duration at the session frame rate.
    pub duration: Duration,
}

/// Writes one segment's frames as a Motion-JPEG elementary stream.
///
/// `finalize` consumes the writer, so a segment closes exactly once.
pub struct SegmentWriter {
    path: PathBuf,
    out: BufWriter<File>,
    resolution: Resolution,
    frame_rate: u32,
    frames: u64,
    bytes: u64,
    last_jpeg: Option<Vec<u8>>,
}

impl SegmentWriter {
    /// Create the intermediate file at `path`.
    #[track_caller]
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn begin(path: impl AsRef<Path>, resolution: Resolution, frame_rate: u32) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| CaptureError::intermediate(&path, e))?;

        debug!(%resolution, frame_rate, "Segment intermediate opened");

        Ok(Self {
            path,
            out: BufWriter::new(file),
            resolution,
            frame_rate,
            frames: 0,
            bytes: 0,
            last_jpeg: None,
        })
    }

    /// Compress and append one frame, resizing it first if needed.
    #[track_caller]
    pub fn write(&mut self, frame: RawFrame) -> CoreResult<()> {
        let frame = frame.resized_to(self.resolution);
        let image = frame.image();

        let mut jpeg = Vec::with_capacity(image.as_raw().len() / 8);
        JpegEncoder::new_with_quality(&mut jpeg, INTERMEDIATE_JPEG_QUALITY)
            .encode(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgb8)
            .map_err(|e| CaptureError::FrameEncoding {
                reason: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        self.append(&jpeg)?;
        self.last_jpeg = Some(jpeg);
        Ok(())
    }

    /// Write the previous frame again. Returns `false` when nothing was written yet.
    #[track_caller]
    pub fn repeat_last(&mut self) -> CoreResult<bool> {
        let Some(jpeg) = self.last_jpeg.take() else {
            return Ok(false);
        };
        let result = self.append(&jpeg);
        self.last_jpeg = Some(jpeg);
        result.map(|()| true)
    }

    #[track_caller]
    fn append(&mut self, jpeg: &[u8]) -> CoreResult<()> {
        self.out
            .write_all(jpeg)
            .map_err(|e| CaptureError::intermediate(&self.path, e))?;
        self.frames += 1;
        self.bytes += jpeg.len() as u64;
        Ok(())
    }

    /// Intermediate path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frame rate the segment plays back at.
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Frames written so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Bytes handed to the file so far (buffered bytes included).
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Flush and close the intermediate.
    #[track_caller]
    #[instrument(skip(self), fields(path = %self.path.display(), frames = self.frames))]
    pub fn finalize(self) -> CoreResult<VideoIntermediate> {
        let Self { path, out, frame_rate, frames, .. } = self;

        let file = out
            .into_inner()
            .map_err(|e| CaptureError::intermediate(&path, e.into_error()))?;
        file.sync_all().map_err(|e| CaptureError::intermediate(&path, e))?;

        let duration = Duration::from_secs_f64(frames as f64 / f64::from(frame_rate.max(1)));
        debug!(?duration, "Segment intermediate closed");

        Ok(VideoIntermediate { path, frames, duration })
    }
}

/// Fixed-tick deadline tracker for the capture loop.
///
/// The deadline advances by exactly one tick per frame, so a loop that falls
/// behind catches up with back-to-back frames instead of skipping ticks.
#[derive(Debug, Clone)]
pub struct FramePacer {
    tick: Duration,
    next_deadline: Instant,
}

impl FramePacer {
    /// Start pacing at `frame_rate`, first tick due immediately.
    pub fn new(frame_rate: u32) -> Self {
        Self::starting_at(frame_rate, Instant::now())
    }

    /// Start pacing with the first tick due at `start`.
    pub fn starting_at(frame_rate: u32, start: Instant) -> Self {
        Self {
            tick: Duration::from_secs_f64(1.0 / f64::from(frame_rate.max(1))),
            next_deadline: start,
        }
    }

    /// `None` if the tick is due at `now`, else how long to sleep.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        let remaining = self.next_deadline.saturating_duration_since(now);
        (!remaining.is_zero()).then_some(remaining)
    }

    /// Move the deadline one tick forward.
    pub fn advance(&mut self) {
        self.next_deadline += self.tick;
    }

    /// Length of one tick.
    pub fn tick(&self) -> Duration {
        self.tick
    }
}
