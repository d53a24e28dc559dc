//! Frame ingestion sources.
//!
//! A `FrameSource` delivers RGB frames from a live stream:
//! - synthetic `stub://` streams (always built, used by tests and
//!   model-free runs)
//! - GStreamer network/file decode (feature: stream-gstreamer)
//!
//! Sources deliver raw frames only; sampling, resizing, and detection are
//! the pipeline's job. `next_frame` returning `Ok(None)` means the stream
//! ended; errors mean the stream failed. Either way the pipeline owns the
//! reconnect policy, not the source.

pub mod stream;

use anyhow::Result;

use crate::frame::Frame;

pub use stream::{StreamConfig, StreamSource};

/// A connected, pollable stream of frames.
pub trait FrameSource: Send {
    /// Establish the stream. Must be called before the first `next_frame`.
    fn connect(&mut self) -> Result<()>;

    /// Pull the next frame. `Ok(None)` signals a clean end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the stream. Calling `stop` on an already-stopped source is
    /// an error; callers release exactly once.
    fn stop(&mut self) -> Result<()>;

    /// Whether the source believes it can still deliver frames.
    fn is_healthy(&self) -> bool;

    /// Delivery statistics for health logging.
    fn stats(&self) -> StreamStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct StreamStats {
    pub frames_delivered: u64,
    pub url: String,
}
