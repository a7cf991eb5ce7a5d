mod capture_config;
mod profiles;

pub use {
    capture_config::{CaptureConfig, Resolution},
    profiles::{AudioProfile, ContainerFormat, VideoEncodeParams, VideoProfile},
};

pub(crate) const DEFAULT_FRAME_RATE: u32 = 30;
pub(crate) const DEFAULT_AUDIO_BITRATE_KBPS: u32 = 192;
pub(crate) const DEFAULT_FILE_PREFIX: &str = "Desktop_Video";
pub(crate) const DEFAULT_AUDIO_CHUNK_FRAMES: usize = 4096;
pub(crate) const DEFAULT_MUX_QUEUE_CAPACITY: usize = 32;

pub(crate) fn default_file_prefix() -> String {
    DEFAULT_FILE_PREFIX.to_string()
}

pub(crate) fn default_audio_chunk_frames() -> usize {
    DEFAULT_AUDIO_CHUNK_FRAMES
}

pub(crate) fn default_mux_queue_capacity() -> usize {
    DEFAULT_MUX_QUEUE_CAPACITY
}
