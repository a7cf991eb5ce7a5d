mod command;
pub(crate) mod encoder;
pub(crate) mod muxer;
mod pipeline;

pub use {
    command::MuxCommandBuilder,
    encoder::{EncodeRequest, EncoderRunner, FfmpegRunner},
    muxer::{MuxOutcome, MuxSettings, Muxer, fallback_path},
    pipeline::{MuxJob, MuxPipeline, MuxSubmitter, PendingJobs},
};
