use crate::{CaptureError, CoreResult};

use std::{
    ffi::OsString,
    panic::Location,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use error_location::ErrorLocation;
use tracing::{debug, instrument};

/// Bytes of encoder stderr kept for failure reports.
pub(crate) const STDERR_TAIL_BYTES: usize = 2000;

/// One encoder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeRequest {
    /// Arguments after the program name.
    pub args: Vec<OsString>,
    /// File the encoder is expected to produce.
    pub output: PathBuf,
}

/// Runs an external encoder to completion.
pub trait EncoderRunner: Send + Sync {
    /// Run `request`. A nonzero exit or spawn failure is
    /// [`CaptureError::EncoderFailed`].
    fn run(&self, request: &EncodeRequest) -> CoreResult<()>;
}

/// Spawns `ffmpeg` as a child process.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    program: PathBuf,
}

impl FfmpegRunner {
    /// Use `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }

    /// Use a specific binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Binary this runner spawns.
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderRunner for FfmpegRunner {
    #[track_caller]
    #[instrument(skip(self, request), fields(output = %request.output.display()))]
    fn run(&self, request: &EncodeRequest) -> CoreResult<()> {
        debug!(program = %self.program.display(), args = ?request.args, "Spawning encoder");

        let output = Command::new(&self.program)
            .args(&request.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| CaptureError::EncoderFailed {
                reason: format!("Failed to spawn {}: {}", self.program.display(), e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        if !output.status.success() {
            return Err(CaptureError::EncoderFailed {
                reason: format!("{}: {}", output.status, stderr_tail(&output.stderr)),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(())
    }
}

/// Last [`STDERR_TAIL_BYTES`] of `stderr`, lossily decoded and trimmed.
pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}
