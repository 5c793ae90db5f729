//! Camera sources producing raw RGB frames
//!
//! A [`FrameSource`] is opened once per process and lent to each streaming
//! session in turn. Frames are borrowed views: the source is free to reuse
//! the underlying buffer on the next pull, and the borrow checker makes sure
//! the session is done with a frame before asking for another one.

mod convert;
mod pattern;
mod v4l2;

pub use convert::yuyv_to_rgb;
pub use pattern::TestPattern;
pub use v4l2::V4lCamera;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture device {index} unavailable: {source}")]
    DeviceUnavailable {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    #[error("capture exhausted: {0}")]
    CaptureExhausted(String),

    #[error("capture not running")]
    NotRunning,
}

/// One uncompressed frame borrowed from a [`FrameSource`].
///
/// Rows are `stride` bytes apart; only the first `width * channels` bytes of
/// each row are pixels, the rest is alignment padding.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub stride: usize,
}

impl<'a> RawFrame<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32, channels: u8, stride: usize) -> Self {
        Self {
            data,
            width,
            height,
            channels,
            stride,
        }
    }

    /// Number of pixel bytes in one row, excluding padding.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    /// Pixel bytes of row `y`, or `None` if the buffer is too short.
    pub fn row(&self, y: u32) -> Option<&'a [u8]> {
        let start = (y as usize).checked_mul(self.stride)?;
        self.data.get(start..start + self.row_bytes())
    }
}

/// Statistics for a capture source
#[derive(Debug, Clone, Default)]
pub struct CaptureStats {
    pub frames_captured: u64,
    pub capture_failures: u64,
    pub is_running: bool,
}

/// A blocking source of raw frames.
pub trait FrameSource {
    /// Blocks until the next frame is available.
    fn pull_frame(&mut self) -> Result<RawFrame<'_>, CaptureError>;

    /// Stops capture and frees the device. Calling it again is a no-op.
    fn release(&mut self);

    fn stats(&self) -> CaptureStats;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn pull_frame(&mut self) -> Result<RawFrame<'_>, CaptureError> {
        (**self).pull_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn stats(&self) -> CaptureStats {
        (**self).stats()
    }
}
