//! Blocking accept loop serving one MJPEG client at a time
//!
//! Further clients wait in the listen backlog until the current session
//! closes. The frame source stays open across sessions.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::camera::FrameSource;
use crate::config::Config;
use crate::encoder::JpegEncoder;
use crate::multipart::{BoundaryError, MultipartFramer};
use crate::streaming::{SessionOptions, SessionReport, StreamSession};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid boundary: {0}")]
    Boundary(#[from] BoundaryError),

    #[error("capture device failed in {0} consecutive sessions")]
    DeviceFailed(u32),
}

pub struct MjpegServer {
    listener: TcpListener,
    framer: MultipartFramer,
    encoder: JpegEncoder,
    options: SessionOptions,
    device_failure_limit: u32,
    consecutive_device_failures: u32,
    session_counter: u64,
}

impl MjpegServer {
    /// Binds `<bind_address>:<port>` from the configuration.
    pub fn bind(config: &Config, port: u16) -> Result<Self, ServerError> {
        let addr = format!("{}:{}", config.server.bind_address, port);
        let listener = TcpListener::bind(&addr).map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
        Self::from_listener(listener, config)
    }

    pub fn from_listener(listener: TcpListener, config: &Config) -> Result<Self, ServerError> {
        let framer = MultipartFramer::new(&config.stream.boundary, &config.server.server_name)?;

        Ok(Self {
            listener,
            framer,
            encoder: JpegEncoder::new(config.stream.jpeg_quality),
            options: SessionOptions::from_config(&config.stream),
            device_failure_limit: config.server.device_failure_limit,
            consecutive_device_failures: 0,
            session_counter: 0,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn framer(&self) -> &MultipartFramer {
        &self.framer
    }

    /// Serves clients one after another.
    ///
    /// Accept errors are logged and skipped. Returns only when the frame
    /// source has failed `device_failure_limit` sessions in a row.
    pub fn run<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> Result<(), ServerError> {
        info!(
            addr = %self.local_addr()?,
            boundary = %self.framer.boundary(),
            quality = self.encoder.quality(),
            "MJPEG server listening"
        );

        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    let report = self.serve(stream, peer, source);
                    self.check_device(&report)?;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// Accepts and serves exactly one connection.
    pub fn serve_one<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<SessionReport, ServerError> {
        let (stream, peer) = self.listener.accept()?;
        let report = self.serve(stream, peer, source);
        self.check_device(&report)?;
        Ok(report)
    }

    fn serve<S: FrameSource + ?Sized>(
        &mut self,
        stream: TcpStream,
        peer: SocketAddr,
        source: &mut S,
    ) -> SessionReport {
        self.session_counter += 1;
        let id = self.session_counter;
        info!(session = id, peer = %peer, "Client connected");

        if let Err(e) = stream.set_nodelay(true) {
            debug!(session = id, error = %e, "Failed to set TCP_NODELAY");
        }

        let session = StreamSession::new(
            id,
            &self.framer,
            &self.encoder,
            source,
            stream,
            self.options,
        );
        let report = session.run();

        info!(
            session = id,
            reason = ?report.end_reason,
            frames = %report.stats.frames_sent,
            bytes = %report.stats.bytes_sent,
            duration_ms = %report.duration.as_millis(),
            "Client session closed"
        );

        report
    }

    fn check_device(&mut self, report: &SessionReport) -> Result<(), ServerError> {
        if report.device_failed() {
            self.consecutive_device_failures += 1;
            warn!(
                failures = self.consecutive_device_failures,
                limit = self.device_failure_limit,
                "Frame source failed before the first frame"
            );

            if self.device_failure_limit > 0
                && self.consecutive_device_failures >= self.device_failure_limit
            {
                error!(
                    failures = self.consecutive_device_failures,
                    "Frame source keeps failing, stopping server"
                );
                return Err(ServerError::DeviceFailed(self.consecutive_device_failures));
            }
        } else if report.stats.frames_sent > 0 {
            self.consecutive_device_failures = 0;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::TestPattern;
    use std::io::Read;
    use std::net::TcpStream;
    use std::thread;

    fn local_server(config: &Config) -> MjpegServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        MjpegServer::from_listener(listener, config).unwrap()
    }

    #[test]
    fn test_rejects_bad_boundary() {
        let mut config = Config::default();
        config.stream.boundary = String::new();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        assert!(matches!(
            MjpegServer::from_listener(listener, &config),
            Err(ServerError::Boundary(_))
        ));
    }

    #[test]
    fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let mut config = Config::default();
        config.server.bind_address = "127.0.0.1".to_string();

        assert!(matches!(
            MjpegServer::bind(&config, port),
            Err(ServerError::Bind { .. })
        ));
    }

    #[test]
    fn test_serve_one_with_frame_limit() {
        let mut config = Config::default();
        config.stream.max_frames = 2;
        let mut server = local_server(&config);
        let addr = server.local_addr().unwrap();

        let client = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            let mut body = Vec::new();
            stream.read_to_end(&mut body).unwrap();
            body
        });

        let mut source = TestPattern::new(32, 24);
        let report = server.serve_one(&mut source).unwrap();
        let body = client.join().unwrap();

        assert_eq!(report.stats.frames_sent, 2);
        assert_eq!(report.stats.bytes_sent, body.len() as u64);
        assert!(body.starts_with(server.framer().initial_header()));
    }

    #[test]
    fn test_device_failure_limit() {
        let mut config = Config::default();
        config.server.device_failure_limit = 2;
        let mut server = local_server(&config);
        let addr = server.local_addr().unwrap();

        let clients = thread::spawn(move || {
            for _ in 0..2 {
                let mut stream = TcpStream::connect(addr).unwrap();
                let mut body = Vec::new();
                let _ = stream.read_to_end(&mut body);
            }
        });

        let mut source = TestPattern::new(32, 24).with_frame_limit(0);
        let result = server.run(&mut source);
        clients.join().unwrap();

        assert!(matches!(result, Err(ServerError::DeviceFailed(2))));
    }
}
