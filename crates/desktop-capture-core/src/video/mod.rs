mod desktop;
mod frame;
mod frame_source;
pub(crate) mod segment_writer;

pub use {
    desktop::DesktopFrameSourceProvider,
    frame::RawFrame,
    frame_source::{FrameSource, FrameSourceProvider, Grab},
    segment_writer::{FramePacer, SegmentWriter, VideoIntermediate},
};
