//! Minimal MJPEG-over-HTTP server for V4L2 cameras
//!
//! Every accepted TCP connection gets an HTTP/1.0 `multipart/x-mixed-replace`
//! response carrying one JPEG per captured frame until the client goes away
//! or the camera stops delivering. Clients are served one at a time.
//!
//! # Example
//!
//! ```no_run
//! use mjpeg_server::camera::TestPattern;
//! use mjpeg_server::config::Config;
//! use mjpeg_server::web_server::MjpegServer;
//!
//! let config = Config::default();
//! let mut source = TestPattern::new(640, 480);
//! let mut server = MjpegServer::bind(&config, 8080)?;
//! server.run(&mut source)?;
//! # Ok::<(), mjpeg_server::web_server::ServerError>(())
//! ```

pub mod camera;
pub mod config;
pub mod encoder;
pub mod multipart;
pub mod streaming;
pub mod web_server;

// Re-exports for convenience
pub use camera::{CaptureError, FrameSource, RawFrame, TestPattern, V4lCamera};
pub use encoder::{EncodeError, EncodedImage, JpegEncoder};
pub use multipart::MultipartFramer;
pub use streaming::{EndReason, SessionReport, SessionStats, StreamSession};
pub use web_server::{MjpegServer, ServerError};
