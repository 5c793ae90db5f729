//! Streaming statistics

use serde::{Deserialize, Serialize};

/// Counters for one MJPEG session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Frames whose tail was fully written
    pub frames_sent: u64,

    /// JPEG payload bytes of delivered frames
    pub jpeg_bytes: u64,

    /// All bytes written, header and envelopes included
    pub bytes_sent: u64,
}

impl SessionStats {
    /// Calculates frame rate based on delta
    pub fn calculate_fps(&self, previous: &Self, elapsed_secs: f64) -> f64 {
        if elapsed_secs == 0.0 {
            return 0.0;
        }

        let frames_delta = self.frames_sent.saturating_sub(previous.frames_sent);
        frames_delta as f64 / elapsed_secs
    }

    /// Calculates bitrate in kbps based on delta
    pub fn calculate_bitrate_kbps(&self, previous: &Self, elapsed_secs: f64) -> f64 {
        if elapsed_secs == 0.0 {
            return 0.0;
        }

        let bytes_delta = self.bytes_sent.saturating_sub(previous.bytes_sent);
        (bytes_delta as f64 * 8.0) / elapsed_secs / 1000.0
    }

    /// Average JPEG size of delivered frames
    pub fn average_frame_bytes(&self) -> u64 {
        if self.frames_sent == 0 {
            return 0;
        }
        self.jpeg_bytes / self.frames_sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_fps() {
        let prev = SessionStats {
            frames_sent: 100,
            ..Default::default()
        };

        let current = SessionStats {
            frames_sent: 130,
            ..Default::default()
        };

        assert_eq!(current.calculate_fps(&prev, 1.0), 30.0);
        assert_eq!(current.calculate_fps(&prev, 0.0), 0.0);
    }

    #[test]
    fn test_calculate_bitrate() {
        let prev = SessionStats::default();

        let current = SessionStats {
            bytes_sent: 125_000, // 125KB in 1 second = 1000 kbps
            ..Default::default()
        };

        assert_eq!(current.calculate_bitrate_kbps(&prev, 1.0), 1000.0);
    }

    #[test]
    fn test_average_frame_bytes() {
        let stats = SessionStats {
            frames_sent: 4,
            jpeg_bytes: 4000,
            bytes_sent: 4400,
        };
        assert_eq!(stats.average_frame_bytes(), 1000);
        assert_eq!(SessionStats::default().average_frame_bytes(), 0);
    }
}
