//! Synthetic frame source for running without camera hardware

use std::thread;
use std::time::Duration;

use tracing::debug;

use super::{CaptureError, CaptureStats, FrameSource, RawFrame};
use crate::config::CaptureConfig;

const PADDING_BYTE: u8 = 0xAA;

/// Moving RGB gradient, optionally with row padding and a frame limit.
pub struct TestPattern {
    width: u32,
    height: u32,
    stride: usize,
    buffer: Vec<u8>,
    interval: Option<Duration>,
    frame_limit: Option<u64>,
    running: bool,
    frames_captured: u64,
    capture_failures: u64,
}

impl TestPattern {
    pub fn new(width: u32, height: u32) -> Self {
        let stride = width as usize * 3;
        Self {
            width,
            height,
            stride,
            buffer: vec![0; stride * height as usize],
            interval: None,
            frame_limit: None,
            running: true,
            frames_captured: 0,
            capture_failures: 0,
        }
    }

    /// Test pattern paced at `config.fps` (unthrottled when 0).
    pub fn from_config(width: u32, height: u32, config: &CaptureConfig) -> Self {
        let pattern = Self::new(width, height);
        match config.fps {
            0 => pattern,
            fps => pattern.with_interval(Duration::from_secs_f64(1.0 / fps as f64)),
        }
    }

    /// Adds `padding` bytes of filler after every row.
    pub fn with_row_padding(mut self, padding: usize) -> Self {
        self.stride = self.width as usize * 3 + padding;
        self.buffer = vec![PADDING_BYTE; self.stride * self.height as usize];
        self
    }

    /// Sleeps this long before every frame, like a real sensor would.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Runs dry after `frames` pulls; later pulls fail with `CaptureExhausted`.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    fn render(&mut self, index: u64) {
        let shift = index % 256;
        let row_bytes = self.width as usize * 3;
        if self.stride == 0 {
            return;
        }

        for (y, row) in self.buffer.chunks_exact_mut(self.stride).enumerate() {
            let y = y as u32;
            for (x, px) in row[..row_bytes].chunks_exact_mut(3).enumerate() {
                let x = x as u32;
                px[0] = ramp(x, self.width, shift);
                px[1] = ramp(y, self.height, shift * 2);
                px[2] = ((((x as u64 + y as u64) / 8) % 2) * 160 + 48) as u8;
            }
        }
    }
}

/// Position along `extent` scaled to 0..=255, then offset by `shift`.
fn ramp(pos: u32, extent: u32, shift: u64) -> u8 {
    ((pos as u64 * 255 / extent.max(1) as u64 + shift) % 256) as u8
}

impl FrameSource for TestPattern {
    fn pull_frame(&mut self) -> Result<RawFrame<'_>, CaptureError> {
        if !self.running {
            return Err(CaptureError::NotRunning);
        }

        if let Some(limit) = self.frame_limit {
            if self.frames_captured >= limit {
                self.capture_failures += 1;
                return Err(CaptureError::CaptureExhausted(format!(
                    "test pattern ran dry after {} frames",
                    limit
                )));
            }
        }

        if let Some(interval) = self.interval {
            thread::sleep(interval);
        }

        let index = self.frames_captured;
        self.render(index);
        self.frames_captured += 1;

        Ok(RawFrame::new(
            &self.buffer,
            self.width,
            self.height,
            3,
            self.stride,
        ))
    }

    fn release(&mut self) {
        if self.running {
            debug!(frames = %self.frames_captured, "Test pattern released");
            self.running = false;
        }
    }

    fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frames_captured,
            capture_failures: self.capture_failures,
            is_running: self.running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry() {
        let mut pattern = TestPattern::new(16, 8);
        let frame = pattern.pull_frame().unwrap();
        assert_eq!(frame.width, 16);
        assert_eq!(frame.height, 8);
        assert_eq!(frame.channels, 3);
        assert_eq!(frame.stride, 48);
        assert_eq!(frame.data.len(), 48 * 8);
    }

    #[test]
    fn test_row_padding_untouched() {
        let mut pattern = TestPattern::new(4, 2).with_row_padding(4);
        assert_eq!(pattern.stride(), 16);
        let frame = pattern.pull_frame().unwrap();
        assert_eq!(frame.stride, 16);
        assert_eq!(&frame.data[12..16], &[PADDING_BYTE; 4]);
        assert_eq!(&frame.data[28..32], &[PADDING_BYTE; 4]);
    }

    #[test]
    fn test_frames_change() {
        let mut pattern = TestPattern::new(8, 8);
        let first = pattern.pull_frame().unwrap().data.to_vec();
        let second = pattern.pull_frame().unwrap().data.to_vec();
        assert_ne!(first, second);
    }

    #[test]
    fn test_frame_limit() {
        let mut pattern = TestPattern::new(4, 4).with_frame_limit(2);
        assert!(pattern.pull_frame().is_ok());
        assert!(pattern.pull_frame().is_ok());
        assert!(matches!(
            pattern.pull_frame(),
            Err(CaptureError::CaptureExhausted(_))
        ));

        let stats = pattern.stats();
        assert_eq!(stats.frames_captured, 2);
        assert_eq!(stats.capture_failures, 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut pattern = TestPattern::new(4, 4);
        pattern.release();
        pattern.release();
        assert!(!pattern.stats().is_running);
        assert!(matches!(pattern.pull_frame(), Err(CaptureError::NotRunning)));
    }

    #[test]
    fn test_from_config_paces_pulls() {
        let config = CaptureConfig {
            fps: 50,
            ..Default::default()
        };
        let mut pattern = TestPattern::from_config(8, 8, &config);

        let started = std::time::Instant::now();
        for _ in 0..3 {
            pattern.pull_frame().unwrap();
        }
        // 20 ms before each pull
        assert!(started.elapsed() >= Duration::from_millis(55));
    }

    #[test]
    fn test_from_config_unthrottled_without_fps() {
        let pattern = TestPattern::from_config(8, 8, &CaptureConfig::default());
        assert!(pattern.interval.is_none());
    }

    #[test]
    fn test_ramp_wide_extent() {
        assert_eq!(ramp(0, 16, 0), 0);
        assert_eq!(ramp(15, 16, 0), 239);
        assert_eq!(ramp(u32::MAX - 1, u32::MAX, 0), 254);
        assert_eq!(ramp(u32::MAX, u32::MAX, 3), 2);
    }
}
