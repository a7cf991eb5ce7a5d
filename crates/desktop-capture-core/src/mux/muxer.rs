use crate::{
    CaptureError, CoreResult,
    audio::AudioIntermediate,
    config::{CaptureConfig, VideoEncodeParams},
    mux::{EncodeRequest, EncoderRunner, MuxCommandBuilder},
    video::VideoIntermediate,
};

use std::{
    fs::{self, OpenOptions},
    io::{self, ErrorKind},
    panic::Location,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};

use error_location::ErrorLocation;
use tracing::{debug, info, instrument, warn};

/// Suffix of the raw-video file kept when encoding fails.
pub(crate) const FALLBACK_SUFFIX: &str = "_video_only.mjpeg";

/// Per-session encode parameters, resolved once from the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxSettings {
    /// Frame rate of the video intermediate.
    pub frame_rate: u32,
    /// Resolved video profile.
    pub video: VideoEncodeParams,
    /// AAC bitrate after the audio profile cap.
    pub audio_bitrate_kbps: u32,
}

impl MuxSettings {
    /// Resolve profiles from `config`.
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            frame_rate: config.frame_rate,
            video: config.video_profile.params(),
            audio_bitrate_kbps: config.effective_audio_bitrate_kbps(),
        }
    }
}

/// What became of one segment.
#[derive(Debug)]
pub enum MuxOutcome {
    /// The final file exists and is non-empty.
    Encoded {
        /// Final file.
        output: PathBuf,
        /// Its size.
        bytes: u64,
    },
    /// Encoding failed; the raw video was kept if it could be.
    Fallback {
        /// Preserved raw video, if preservation succeeded.
        preserved: Option<PathBuf>,
        /// Why the encode failed.
        error: CaptureError,
    },
    /// The segment had no frames; nothing was encoded.
    Empty,
}

/// Encodes finished segments and removes their intermediates.
#[derive(Clone)]
pub struct Muxer {
    runner: Arc<dyn EncoderRunner>,
    filter_threads: usize,
}

impl Muxer {
    /// Use `runner`, with one filter thread per logical CPU.
    pub fn new(runner: Arc<dyn EncoderRunner>) -> Self {
        let filter_threads = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            runner,
            filter_threads,
        }
    }

    /// Encode `video` plus up to two `audio` tracks into `output`.
    ///
    /// Never fails: encoder errors become [`MuxOutcome::Fallback`].
    /// Intermediates are gone when this returns, except a preserved fallback.
    #[instrument(skip_all, fields(output = %output.display(), audio_tracks = audio.len()))]
    pub fn mux(
        &self,
        video: &VideoIntermediate,
        audio: &[AudioIntermediate],
        output: &Path,
        settings: &MuxSettings,
    ) -> MuxOutcome {
        let outcome = if video.frames == 0 {
            warn!("Segment has no frames, skipping encode");
            remove_intermediate(&video.path);
            MuxOutcome::Empty
        } else {
            match self.encode(video, audio, output, settings) {
                Ok(bytes) => {
                    info!(bytes, frames = video.frames, "Segment encoded");
                    remove_intermediate(&video.path);
                    MuxOutcome::Encoded {
                        output: output.to_path_buf(),
                        bytes,
                    }
                }
                Err(error) => {
                    warn!(%error, "Encode failed, preserving raw video");
                    remove_intermediate(output);
                    let preserved = match preserve_video(&video.path, output) {
                        Ok(path) => Some(path),
                        Err(e) => {
                            warn!(error = %e, "Failed to preserve raw video");
                            remove_intermediate(&video.path);
                            None
                        }
                    };
                    MuxOutcome::Fallback { preserved, error }
                }
            }
        };

        for track in audio {
            remove_intermediate(&track.path);
        }

        outcome
    }

    #[track_caller]
    fn encode(
        &self,
        video: &VideoIntermediate,
        audio: &[AudioIntermediate],
        output: &Path,
        settings: &MuxSettings,
    ) -> CoreResult<u64> {
        if audio.len() > 2 {
            warn!(tracks = audio.len(), "More than two audio tracks, extra tracks ignored");
        }

        let builder = MuxCommandBuilder::new(&video.path, settings.frame_rate, output)
            .with_audio_inputs(audio.iter().map(|a| a.path.clone()))
            .with_video_params(settings.video)
            .with_audio_bitrate(settings.audio_bitrate_kbps)
            .with_filter_threads(self.filter_threads);

        let request = EncodeRequest {
            args: builder.build(),
            output: output.to_path_buf(),
        };
        self.runner.run(&request)?;

        // Exit status alone is not trusted; the file must exist and hold data.
        match fs::metadata(output) {
            Ok(meta) if meta.len() > 0 => Ok(meta.len()),
            Ok(_) => Err(CaptureError::EncoderFailed {
                reason: "Encoder produced an empty file".to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
            Err(e) => Err(CaptureError::EncoderFailed {
                reason: format!("Encoder produced no file: {}", e),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}

/// `<dir>/<output-stem>_video_only.mjpeg` beside `output`.
pub fn fallback_path(output: &Path) -> PathBuf {
    output.with_file_name(format!("{}{}", output_stem(output), FALLBACK_SUFFIX))
}

fn output_stem(output: &Path) -> String {
    output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "segment".to_string())
}

/// Fallback names to try in order: the plain one, then `_video_only_001.mjpeg` upward.
fn fallback_candidates(output: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    let stem = output_stem(output);
    let base = FALLBACK_SUFFIX.trim_end_matches(".mjpeg");
    std::iter::once(fallback_path(output)).chain(
        (1..=MAX_FALLBACK_ATTEMPTS).map(move |n| output.with_file_name(format!("{}{}_{:03}.mjpeg", stem, base, n))),
    )
}

const MAX_FALLBACK_ATTEMPTS: u32 = 999;

/// Claim a fallback name that no earlier file holds, then move the raw video into it.
#[track_caller]
fn preserve_video(video: &Path, output: &Path) -> CoreResult<PathBuf> {
    let mut claimed = None;
    for candidate in fallback_candidates(output) {
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => {
                claimed = Some(candidate);
                break;
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %candidate.display(), "Fallback name taken");
            }
            Err(e) => return Err(CaptureError::intermediate(&candidate, e)),
        }
    }
    let target = claimed.ok_or_else(|| {
        CaptureError::intermediate(
            &fallback_path(output),
            io::Error::new(ErrorKind::AlreadyExists, "no free fallback name"),
        )
    })?;

    // Only ever replaces the empty placeholder claimed above.
    if fs::rename(video, &target).is_err() {
        // Different filesystem: copy, then drop the original.
        if let Err(e) = fs::copy(video, &target) {
            remove_intermediate(&target);
            return Err(CaptureError::intermediate(video, e));
        }
        remove_intermediate(video);
    }

    debug!(path = %target.display(), "Raw video preserved");
    Ok(target)
}

fn remove_intermediate(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Intermediate removed"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove intermediate"),
    }
}
