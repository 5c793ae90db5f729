//! Per-connection MJPEG session
//!
//! A session walks `Connected -> HeaderSent -> Streaming -> Closed`. Every
//! frame is pulled, encoded and written before the next one is pulled, so
//! at most one encoded image is alive at any time and a slow client directly
//! throttles capture.

use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::SessionStats;
use crate::camera::FrameSource;
use crate::config::StreamConfig;
use crate::encoder::{EncodedImage, JpegEncoder};
use crate::multipart::MultipartFramer;

/// Byte sink a session streams into.
pub trait Connection: Write {
    /// Flushes and closes the sink. Closing an already closed sink is not an
    /// error.
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl Connection for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        let _ = self.flush();
        match self.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

impl Connection for Vec<u8> {}

impl<C: Connection + ?Sized> Connection for &mut C {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    HeaderSent,
    Streaming,
    Closed,
}

/// Why a session reached `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The response header could not be written
    HeaderSendFailed,
    /// A frame write failed; the peer is gone
    ClientGone,
    /// The source returned no frame
    CaptureFailed,
    /// A frame could not be compressed
    EncodeFailed,
    /// `max_frames` frames were delivered
    FrameLimit,
}

/// Session limits and logging cadence
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// 0 = unlimited
    pub max_frames: u64,
    /// 0 = no progress logging
    pub stats_interval_frames: u64,
}

impl SessionOptions {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            max_frames: config.max_frames,
            stats_interval_frames: config.stats_interval_frames,
        }
    }
}

/// Outcome of a finished session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub id: u64,
    pub state: SessionState,
    pub end_reason: EndReason,
    pub stats: SessionStats,
    pub duration: Duration,
}

impl SessionReport {
    /// True when the source failed before a single frame went out.
    pub fn device_failed(&self) -> bool {
        self.end_reason == EndReason::CaptureFailed && self.stats.frames_sent == 0
    }
}

pub struct StreamSession<'a, S: FrameSource + ?Sized, C: Connection> {
    id: u64,
    framer: &'a MultipartFramer,
    encoder: &'a JpegEncoder,
    source: &'a mut S,
    conn: C,
    options: SessionOptions,
    state: SessionState,
    stats: SessionStats,
    last_report_at: Instant,
    last_report: SessionStats,
}

impl<'a, S: FrameSource + ?Sized, C: Connection> StreamSession<'a, S, C> {
    pub fn new(
        id: u64,
        framer: &'a MultipartFramer,
        encoder: &'a JpegEncoder,
        source: &'a mut S,
        conn: C,
        options: SessionOptions,
    ) -> Self {
        Self {
            id,
            framer,
            encoder,
            source,
            conn,
            options,
            state: SessionState::Connected,
            stats: SessionStats::default(),
            last_report_at: Instant::now(),
            last_report: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Streams until the session closes, then closes the connection.
    pub fn run(mut self) -> SessionReport {
        let started = Instant::now();

        let end_reason = loop {
            match self.state {
                SessionState::Connected => match self.send_header() {
                    Ok(()) => self.transition(SessionState::HeaderSent),
                    Err(e) => {
                        debug!(session = self.id, error = %e, "Failed to send response header");
                        break EndReason::HeaderSendFailed;
                    }
                },
                SessionState::HeaderSent => self.transition(SessionState::Streaming),
                SessionState::Streaming => {
                    if let Some(reason) = self.step() {
                        break reason;
                    }
                }
                SessionState::Closed => break EndReason::ClientGone,
            }
        };

        self.transition(SessionState::Closed);
        if let Err(e) = self.conn.close() {
            debug!(session = self.id, error = %e, "Error closing connection");
        }

        SessionReport {
            id: self.id,
            state: self.state,
            end_reason,
            stats: self.stats,
            duration: started.elapsed(),
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(session = self.id, from = ?self.state, to = ?next, "Session state change");
        self.state = next;
    }

    fn send_header(&mut self) -> io::Result<()> {
        let header = self.framer.initial_header();
        self.conn.write_all(header)?;
        self.stats.bytes_sent += header.len() as u64;
        Ok(())
    }

    /// One pull/encode/send cycle. Returns the end reason when the session
    /// must close.
    fn step(&mut self) -> Option<EndReason> {
        if self.options.max_frames > 0 && self.stats.frames_sent >= self.options.max_frames {
            return Some(EndReason::FrameLimit);
        }

        let image = {
            let frame = match self.source.pull_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(session = self.id, error = %e, "Capture failed, closing session");
                    return Some(EndReason::CaptureFailed);
                }
            };

            match self.encoder.encode(&frame) {
                Ok(image) => image,
                Err(e) => {
                    warn!(session = self.id, error = %e, "Encoding failed, closing session");
                    return Some(EndReason::EncodeFailed);
                }
            }
        };

        match self.send_frame(&image) {
            Ok(written) => {
                self.stats.frames_sent += 1;
                self.stats.jpeg_bytes += image.len() as u64;
                self.stats.bytes_sent += written as u64;
                self.log_progress();
                None
            }
            Err(e) => {
                info!(
                    session = self.id,
                    error = %e,
                    frame = self.stats.frames_sent + 1,
                    "Client gone"
                );
                Some(EndReason::ClientGone)
            }
        }
    }

    /// Writes head, payload and tail; stops at the first failed write.
    fn send_frame(&mut self, image: &EncodedImage) -> io::Result<usize> {
        let head = self.framer.frame_envelope_head(image);
        let tail = self.framer.frame_envelope_tail();

        self.conn.write_all(&head)?;
        self.conn.write_all(image.as_bytes())?;
        self.conn.write_all(tail)?;

        Ok(head.len() + image.len() + tail.len())
    }

    fn log_progress(&mut self) {
        let interval = self.options.stats_interval_frames;
        if interval == 0 || self.stats.frames_sent % interval != 0 {
            return;
        }

        let elapsed = self.last_report_at.elapsed().as_secs_f64();
        info!(
            session = self.id,
            frames = %self.stats.frames_sent,
            fps = %format!("{:.1}", self.stats.calculate_fps(&self.last_report, elapsed)),
            kbps = %format!("{:.0}", self.stats.calculate_bitrate_kbps(&self.last_report, elapsed)),
            avg_frame_bytes = %self.stats.average_frame_bytes(),
            "Streaming progress"
        );

        self.last_report_at = Instant::now();
        self.last_report = self.stats.clone();
    }
}
