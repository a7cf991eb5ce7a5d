use crate::{
    CaptureError, CoreResult,
    config::{
        AudioProfile, ContainerFormat, DEFAULT_AUDIO_BITRATE_KBPS, DEFAULT_AUDIO_CHUNK_FRAMES,
        DEFAULT_FILE_PREFIX, DEFAULT_FRAME_RATE, DEFAULT_MUX_QUEUE_CAPACITY, VideoProfile,
        default_audio_chunk_frames, default_file_prefix, default_mux_queue_capacity,
    },
};

use std::{fmt, panic::Location, path::PathBuf, time::Duration};

use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};

/// Output frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// 1920x1080.
    pub const FULL_HD: Resolution = Resolution::new(1920, 1080);
    /// 1280x720.
    pub const HD: Resolution = Resolution::new(1280, 720);
    /// 854x480.
    pub const SD: Resolution = Resolution::new(854, 480);

    /// Create a resolution.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Immutable per-session capture settings.
///
/// Loaded once by the caller and handed to
/// [`SegmentScheduler::start`](crate::SegmentScheduler::start); the core never
/// writes it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Resolution every frame is normalized to.
    pub resolution: Resolution,
    /// Target frames per second.
    pub frame_rate: u32,
    /// Directory for final encoded files.
    pub output_dir: PathBuf,
    /// Final container format.
    #[serde(default)]
    pub container: ContainerFormat,
    /// Video compression profile.
    #[serde(default)]
    pub video_profile: VideoProfile,
    /// Audio compression profile.
    #[serde(default)]
    pub audio_profile: AudioProfile,
    /// User-selected audio bitrate in kbps, before the profile cap.
    pub audio_bitrate_kbps: u32,
    /// Split into a new segment after this long. `None` records one segment.
    #[serde(
        default,
        rename = "segment_duration_secs",
        with = "optional_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub segment_duration: Option<Duration>,
    /// Prefix of final file names.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// Where intermediates live. `None` uses the system temp directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    /// Frames per blocking audio read.
    #[serde(default = "default_audio_chunk_frames")]
    pub audio_chunk_frames: usize,
    /// Finished segments allowed to wait for the mux worker.
    #[serde(default = "default_mux_queue_capacity")]
    pub mux_queue_capacity: usize,
}

impl CaptureConfig {
    /// A 1080p, 30 fps, unsplit MKV configuration writing into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            resolution: Resolution::FULL_HD,
            frame_rate: DEFAULT_FRAME_RATE,
            output_dir: output_dir.into(),
            container: ContainerFormat::default(),
            video_profile: VideoProfile::default(),
            audio_profile: AudioProfile::default(),
            audio_bitrate_kbps: DEFAULT_AUDIO_BITRATE_KBPS,
            segment_duration: None,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            temp_dir: None,
            audio_chunk_frames: DEFAULT_AUDIO_CHUNK_FRAMES,
            mux_queue_capacity: DEFAULT_MUX_QUEUE_CAPACITY,
        }
    }

    /// Whether segment splitting is enabled.
    pub fn splits_enabled(&self) -> bool {
        self.segment_duration.is_some()
    }

    /// Audio bitrate after the profile cap.
    pub fn effective_audio_bitrate_kbps(&self) -> u32 {
        self.audio_profile
            .effective_bitrate_kbps(self.audio_bitrate_kbps)
    }

    /// Directory for intermediates.
    pub fn intermediate_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Duration of one frame tick.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate.max(1)))
    }

    /// Reject settings the pipeline cannot honour.
    #[track_caller]
    pub fn validate(&self) -> CoreResult<()> {
        let reject = |reason: String| CaptureError::InvalidConfig {
            reason,
            location: ErrorLocation::from(Location::caller()),
        };

        let Resolution { width, height } = self.resolution;
        if width == 0 || height == 0 {
            return Err(reject(format!("resolution {} has a zero dimension", self.resolution)));
        }
        // yuv420p subsamples chroma 2x2
        if width % 2 != 0 || height % 2 != 0 {
            return Err(reject(format!("resolution {} must have even dimensions", self.resolution)));
        }
        if !(1..=240).contains(&self.frame_rate) {
            return Err(reject(format!("frame rate {} outside 1..=240", self.frame_rate)));
        }
        if self.audio_bitrate_kbps == 0 {
            return Err(reject("audio bitrate must be non-zero".to_string()));
        }
        if self.segment_duration.is_some_and(|d| d.is_zero()) {
            return Err(reject("segment duration must be non-zero".to_string()));
        }
        if self.audio_chunk_frames == 0 {
            return Err(reject("audio chunk size must be non-zero".to_string()));
        }
        if self.mux_queue_capacity == 0 {
            return Err(reject("mux queue capacity must be non-zero".to_string()));
        }
        if self.file_prefix.trim().is_empty() {
            return Err(reject("file prefix must not be empty".to_string()));
        }
        Ok(())
    }
}

mod optional_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub(super) fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        match Option::<f64>::deserialize(deserializer)? {
            Some(secs) if secs.is_finite() && secs > 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
            Some(secs) => Err(D::Error::custom(format!(
                "segment_duration_secs must be a positive number, got {secs}"
            ))),
            None => Ok(None),
        }
    }
}
