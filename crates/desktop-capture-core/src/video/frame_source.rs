use crate::{CoreResult, config::Resolution, video::RawFrame};

/// Result of one grab attempt.
#[derive(Debug)]
pub enum Grab {
    /// A fresh frame normalized to the session resolution.
    Frame(RawFrame),
    /// Nothing new this tick. Transient; retry on the next tick.
    NotReady,
}

/// A live capture context. Opened once per session and reused across segments.
///
/// Lives on the capture thread only, so implementations need not be `Send`.
/// Losing the display is reported as [`CaptureError::CaptureLost`](crate::CaptureError::CaptureLost).
pub trait FrameSource {
    /// Pull the current desktop image.
    fn grab(&mut self) -> CoreResult<Grab>;

    /// Short label for logs and status.
    fn variant(&self) -> &'static str;
}

/// Opens [`FrameSource`]s. Held by the scheduler for its whole lifetime.
pub trait FrameSourceProvider: Send + Sync {
    /// Create a capture context producing frames at `target`.
    ///
    /// Fails with [`CaptureError::CaptureUnavailable`](crate::CaptureError::CaptureUnavailable)
    /// when no context can be created.
    fn open(&self, target: Resolution) -> CoreResult<Box<dyn FrameSource>>;
}
