//! Desktop Capture Core Library
//!
//! Segmented desktop recording: screen frames via `xcap`, system and
//! microphone audio via CPAL, and a single background `ffmpeg` worker that
//! turns each finished segment into an H.264/AAC file.
//!
//! # Example
//!
//! ```no_run
//! use desktop_capture_core::{
//!     CaptureConfig, CoreResult, CpalDeviceProvider, DesktopFrameSourceProvider, FfmpegRunner,
//!     SegmentScheduler,
//! };
//!
//! use std::{sync::Arc, thread::sleep, time::Duration};
//!
//! fn main() -> CoreResult<()> {
//!     let mut config = CaptureConfig::new("recordings");
//!     config.segment_duration = Some(Duration::from_secs(600));
//!
//!     let mut scheduler = SegmentScheduler::new(
//!         Arc::new(DesktopFrameSourceProvider::new()),
//!         Arc::new(CpalDeviceProvider::new()),
//!         Arc::new(FfmpegRunner::new()),
//!     );
//!
//!     scheduler.start(config)?;
//!     sleep(Duration::from_secs(30));
//!     scheduler.stop();
//!     scheduler.await_all_pending();
//!
//!     println!("Last file: {:?}", scheduler.status().last_output);
//!     scheduler.cleanup();
//!     Ok(())
//! }
//! ```

mod audio;
mod config;
mod error;
mod mux;
mod session;
mod video;

pub use {
    audio::{
        AudioDevice, AudioDeviceProvider, AudioInput, AudioIntermediate, AudioReadError, AudioRole,
        AudioTap, CpalDeviceProvider, PendingAudio, StreamSpec, TapStats,
    },
    config::{AudioProfile, CaptureConfig, ContainerFormat, Resolution, VideoEncodeParams, VideoProfile},
    error::{CaptureError, Result as CoreResult},
    mux::{
        EncodeRequest, EncoderRunner, FfmpegRunner, MuxCommandBuilder, MuxJob, MuxOutcome,
        MuxPipeline, MuxSettings, MuxSubmitter, Muxer, PendingJobs, fallback_path,
    },
    session::{
        AudioSourceStatus, OutputNamer, SchedulerState, SegmentReport, SegmentResult,
        SegmentScheduler, SessionState, SessionStatus, StatusHandle,
    },
    video::{
        DesktopFrameSourceProvider, FramePacer, FrameSource, FrameSourceProvider, Grab, RawFrame,
        SegmentWriter, VideoIntermediate,
    },
};

#[cfg(test)]
mod tests;
