use crate::CoreResult;

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which system audio stream a tap records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioRole {
    /// What the speakers play (default output device, loopback).
    Loopback,
    /// Default microphone.
    Microphone,
}

impl AudioRole {
    /// Tag used in intermediate file names.
    pub fn file_tag(&self) -> &'static str {
        match self {
            AudioRole::Loopback => "loopback",
            AudioRole::Microphone => "mic",
        }
    }
}

impl fmt::Display for AudioRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AudioRole::Loopback => "system audio",
            AudioRole::Microphone => "microphone",
        })
    }
}

/// Sample layout of an opened input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    /// Interleaved channel count.
    pub channels: u16,
    /// Frames per second.
    pub sample_rate: u32,
}

/// Why a chunk read produced no samples.
#[derive(Debug, Error)]
pub enum AudioReadError {
    /// No full chunk arrived within the read timeout.
    #[error("no audio within timeout")]
    Timeout,
    /// The device outran the reader; this many chunks were dropped.
    #[error("input overflow, {dropped} chunk(s) dropped")]
    Overflow {
        /// Chunks dropped since the previous read.
        dropped: u64,
    },
    /// The stream is gone. No further reads will succeed.
    #[error("input stream failed: {0}")]
    Disconnected(String),
}

/// Looks up the default device for a role at session start.
pub trait AudioDeviceProvider: Send + Sync {
    /// `None` when the platform has no such device.
    fn resolve(&self, role: AudioRole) -> Option<Box<dyn AudioDevice>>;
}

/// A resolved device, not yet streaming. Moved onto the tap thread before opening.
pub trait AudioDevice: Send {
    /// Human-readable device name.
    fn name(&self) -> String;

    /// Start streaming in chunks of `chunk_frames` frames.
    fn open(self: Box<Self>, chunk_frames: usize) -> CoreResult<Box<dyn AudioInput>>;
}

/// A running input stream delivering fixed-size interleaved i16 chunks.
pub trait AudioInput {
    /// Layout of delivered samples.
    fn spec(&self) -> StreamSpec;

    /// Block up to `timeout` for the next chunk, replacing `chunk`'s contents.
    fn read_chunk(&mut self, chunk: &mut Vec<i16>, timeout: Duration) -> Result<(), AudioReadError>;
}
