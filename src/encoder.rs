//! In-memory JPEG compression of raw frames

use std::borrow::Cow;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use thiserror::Error;

use crate::camera::RawFrame;

pub const DEFAULT_QUALITY: u8 = 80;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("invalid frame geometry: {0}")]
    InvalidGeometry(String),

    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u8),

    #[error("frame buffer too short: need {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),

    #[error("encoder produced no data")]
    Empty,
}

/// A complete JPEG image produced from one frame.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    data: Bytes,
    width: u32,
    height: u32,
    channels: u8,
}

impl EncodedImage {
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Exact number of JPEG bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Color components in the JPEG (1 for grayscale, 3 for RGB).
    pub fn channels(&self) -> u8 {
        self.channels
    }
}

/// Baseline JPEG encoder with a fixed quality.
///
/// Every call builds its own compression context, so one encoder can be
/// shared by reference without any per-frame state leaking between calls.
#[derive(Debug, Clone, Copy)]
pub struct JpegEncoder {
    quality: u8,
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY)
    }
}

impl JpegEncoder {
    /// Creates an encoder; quality is clamped to 1-100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Compresses `frame` into a new JPEG buffer.
    ///
    /// Rows are read top to bottom, `frame.stride` bytes apart. 4-channel
    /// frames are treated as RGBX and the fourth byte is dropped.
    pub fn encode(&self, frame: &RawFrame<'_>) -> Result<EncodedImage, EncodeError> {
        let (out_channels, color_type) = match frame.channels {
            1 => (1u8, ExtendedColorType::L8),
            3 | 4 => (3u8, ExtendedColorType::Rgb8),
            other => return Err(EncodeError::UnsupportedChannels(other)),
        };

        validate_geometry(frame)?;

        let pixels = packed_pixels(frame, out_channels)?;

        let mut jpeg = Vec::with_capacity(pixels.len() / 8);
        ImageJpegEncoder::new_with_quality(&mut jpeg, self.quality).write_image(
            &pixels,
            frame.width,
            frame.height,
            color_type,
        )?;

        if jpeg.is_empty() {
            return Err(EncodeError::Empty);
        }

        Ok(EncodedImage {
            data: Bytes::from(jpeg),
            width: frame.width,
            height: frame.height,
            channels: out_channels,
        })
    }
}

/// Pixel rows back to back, borrowed when the frame already has that layout.
fn packed_pixels<'a>(
    frame: &RawFrame<'a>,
    out_channels: u8,
) -> Result<Cow<'a, [u8]>, EncodeError> {
    let data: &'a [u8] = frame.data;
    let row_bytes = frame.row_bytes();
    let height = frame.height as usize;

    if frame.channels == out_channels && frame.stride == row_bytes {
        return Ok(Cow::Borrowed(&data[..row_bytes * height]));
    }

    let mut packed = Vec::with_capacity(frame.width as usize * height * out_channels as usize);
    for y in 0..frame.height {
        let row = frame.row(y).ok_or(EncodeError::BufferTooShort {
            expected: required_len(frame),
            actual: frame.data.len(),
        })?;

        if frame.channels == 4 {
            for px in row.chunks_exact(4) {
                packed.extend_from_slice(&px[..3]);
            }
        } else {
            packed.extend_from_slice(row);
        }
    }

    Ok(Cow::Owned(packed))
}

fn required_len(frame: &RawFrame<'_>) -> usize {
    frame.stride * (frame.height as usize).saturating_sub(1) + frame.row_bytes()
}

fn validate_geometry(frame: &RawFrame<'_>) -> Result<(), EncodeError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(EncodeError::InvalidGeometry(format!(
            "{}x{} has no pixels",
            frame.width, frame.height
        )));
    }

    // Baseline JPEG stores dimensions as 16-bit values
    if frame.width > u16::MAX as u32 || frame.height > u16::MAX as u32 {
        return Err(EncodeError::InvalidGeometry(format!(
            "{}x{} exceeds JPEG limits",
            frame.width, frame.height
        )));
    }

    if frame.stride < frame.row_bytes() {
        return Err(EncodeError::InvalidGeometry(format!(
            "stride {} is shorter than a {}-byte row",
            frame.stride,
            frame.row_bytes()
        )));
    }

    let expected = required_len(frame);
    if frame.data.len() < expected {
        return Err(EncodeError::BufferTooShort {
            expected,
            actual: frame.data.len(),
        });
    }

    Ok(())
}
