//! V4L2 camera source

use std::io;

use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

use super::{convert, CaptureError, CaptureStats, FrameSource, RawFrame};
use crate::config::{CaptureConfig, PixelFormat};

const BUFFER_COUNT: u32 = 4;

/// Camera grabs frames from `/dev/video<index>` through an mmap stream.
///
/// YUYV frames are converted into an RGB buffer owned by the camera; RGB3
/// frames are handed out straight from the mapped driver buffer.
pub struct V4lCamera {
    index: usize,
    stream: Option<MmapStream<'static>>,
    pixel_format: PixelFormat,
    width: u32,
    height: u32,
    stride: usize,
    rgb: Vec<u8>,
    frames_captured: u64,
    capture_failures: u64,
}

impl V4lCamera {
    /// Opens the device and starts streaming.
    ///
    /// `width` and `height` are a request; the driver may pick the nearest
    /// size it supports, and frames always carry the negotiated geometry.
    pub fn open(
        index: usize,
        width: u32,
        height: u32,
        config: &CaptureConfig,
    ) -> Result<Self, CaptureError> {
        let unavailable = |source: io::Error| CaptureError::DeviceUnavailable { index, source };

        let device = Device::new(index).map_err(unavailable)?;

        let requested = Format::new(width, height, fourcc_for(config.pixel_format));
        let format = Capture::set_format(&device, &requested).map_err(unavailable)?;
        info!(index, format = %format, "Camera format negotiated");

        let pixel_format = pixel_format_of(&format.fourcc)
            .ok_or_else(|| CaptureError::UnsupportedFormat(format.fourcc.to_string()))?;

        if format.width != width || format.height != height {
            warn!(
                requested = %format!("{}x{}", width, height),
                actual = %format!("{}x{}", format.width, format.height),
                "Driver adjusted capture resolution"
            );
        }

        if config.fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.fps);
            if let Err(e) = Capture::set_params(&device, &params) {
                warn!(fps = config.fps, error = %e, "Failed to set frame rate, using driver default");
            }
        }

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(unavailable)?;

        let stride = match format.stride as usize {
            0 => format.width as usize * bytes_per_pixel(pixel_format),
            stride => stride,
        };
        debug!(index, stride, buffers = BUFFER_COUNT, "Camera stream started");

        Ok(Self {
            index,
            stream: Some(stream),
            pixel_format,
            width: format.width,
            height: format.height,
            stride,
            rgb: Vec::new(),
            frames_captured: 0,
            capture_failures: 0,
        })
    }

    /// Negotiated frame width and height.
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }
}

impl FrameSource for V4lCamera {
    fn pull_frame(&mut self) -> Result<RawFrame<'_>, CaptureError> {
        let stream = self.stream.as_mut().ok_or(CaptureError::NotRunning)?;

        let (buf, used) = match CaptureStream::next(stream) {
            Ok((buf, meta)) => (buf, (meta.bytesused as usize).min(buf.len())),
            Err(e) => {
                self.capture_failures += 1;
                return Err(CaptureError::CaptureExhausted(e.to_string()));
            }
        };

        if used == 0 {
            self.capture_failures += 1;
            return Err(CaptureError::CaptureExhausted(
                "device returned an empty buffer".to_string(),
            ));
        }
        let data = &buf[..used];

        match self.pixel_format {
            PixelFormat::Yuyv => {
                if convert::yuyv_to_rgb(data, self.width, self.height, self.stride, &mut self.rgb)
                    .is_none()
                {
                    self.capture_failures += 1;
                    return Err(CaptureError::CaptureExhausted(format!(
                        "short YUYV frame: {} bytes",
                        used
                    )));
                }
                self.frames_captured += 1;
                Ok(RawFrame::new(
                    &self.rgb,
                    self.width,
                    self.height,
                    3,
                    self.width as usize * 3,
                ))
            }
            PixelFormat::Rgb3 => {
                let needed = self.stride * (self.height as usize).saturating_sub(1)
                    + self.width as usize * 3;
                if used < needed {
                    self.capture_failures += 1;
                    return Err(CaptureError::CaptureExhausted(format!(
                        "short RGB3 frame: {} of {} bytes",
                        used, needed
                    )));
                }
                self.frames_captured += 1;
                Ok(RawFrame::new(data, self.width, self.height, 3, self.stride))
            }
        }
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            info!(
                index = self.index,
                frames = %self.frames_captured,
                failures = %self.capture_failures,
                "Camera released"
            );
        }
    }

    fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frames_captured,
            capture_failures: self.capture_failures,
            is_running: self.stream.is_some(),
        }
    }
}

impl Drop for V4lCamera {
    fn drop(&mut self) {
        self.release();
    }
}

fn fourcc_for(format: PixelFormat) -> FourCC {
    match format {
        PixelFormat::Yuyv => FourCC::new(b"YUYV"),
        PixelFormat::Rgb3 => FourCC::new(b"RGB3"),
    }
}

fn pixel_format_of(fourcc: &FourCC) -> Option<PixelFormat> {
    if *fourcc == FourCC::new(b"YUYV") {
        Some(PixelFormat::Yuyv)
    } else if *fourcc == FourCC::new(b"RGB3") {
        Some(PixelFormat::Rgb3)
    } else {
        None
    }
}

fn bytes_per_pixel(format: PixelFormat) -> usize {
    match format {
        PixelFormat::Yuyv => 2,
        PixelFormat::Rgb3 => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_is_unavailable() {
        let result = V4lCamera::open(9999, 640, 480, &CaptureConfig::default());
        assert!(matches!(
            result,
            Err(CaptureError::DeviceUnavailable { index: 9999, .. })
        ));
    }

    #[test]
    fn test_fourcc_mapping() {
        assert_eq!(
            pixel_format_of(&fourcc_for(PixelFormat::Yuyv)),
            Some(PixelFormat::Yuyv)
        );
        assert_eq!(
            pixel_format_of(&fourcc_for(PixelFormat::Rgb3)),
            Some(PixelFormat::Rgb3)
        );
        assert_eq!(pixel_format_of(&FourCC::new(b"MJPG")), None);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut camera = V4lCamera {
            index: 0,
            stream: None,
            pixel_format: PixelFormat::Yuyv,
            width: 4,
            height: 4,
            stride: 8,
            rgb: Vec::new(),
            frames_captured: 0,
            capture_failures: 0,
        };

        camera.release();
        camera.release();
        assert!(!camera.stats().is_running);
        assert_eq!(camera.pixel_format(), PixelFormat::Yuyv);
        assert!(matches!(camera.pull_frame(), Err(CaptureError::NotRunning)));
    }
}
