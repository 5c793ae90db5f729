//! MJPEG session loop and its statistics

mod session;
mod stats;

pub use session::{
    Connection, EndReason, SessionOptions, SessionReport, SessionState, StreamSession,
};
pub use stats::SessionStats;
