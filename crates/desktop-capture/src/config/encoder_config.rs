use desktop_capture_core::FfmpegRunner;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// External encoder configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Path to the ffmpeg executable (None = resolve `ffmpeg` on PATH).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<PathBuf>,
}

impl EncoderConfig {
    /// Runner for the configured executable.
    pub fn runner(&self) -> FfmpegRunner {
        match &self.ffmpeg_path {
            Some(path) => FfmpegRunner::with_program(path),
            None => FfmpegRunner::new(),
        }
    }
}
