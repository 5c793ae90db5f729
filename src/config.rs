//! Configuration management for the MJPEG server
//!
//! Every key is optional. Without a config file the server behaves exactly as
//! the four positional CLI arguments describe.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::multipart::validate_boundary;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Listening socket and accept loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind; the port always comes from the command line
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Value of the `Server` response header. Defaults to the package name;
    /// set it to `Magnus` for clients that match on the legacy `Server` line.
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Consecutive sessions failing on their first pull before the server
    /// gives up on the device (0 = never)
    #[serde(default = "default_device_failure_limit")]
    pub device_failure_limit: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            server_name: default_server_name(),
            device_failure_limit: default_device_failure_limit(),
        }
    }
}

/// Per-session stream settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Multipart boundary token
    #[serde(default = "default_boundary")]
    pub boundary: String,

    /// JPEG quality (1-100)
    #[serde(default = "default_quality")]
    pub jpeg_quality: u8,

    /// Frames delivered before a session ends on its own (0 = unlimited)
    #[serde(default)]
    pub max_frames: u64,

    /// Progress is logged every this many frames (0 = never)
    #[serde(default = "default_stats_interval")]
    pub stats_interval_frames: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            boundary: default_boundary(),
            jpeg_quality: default_quality(),
            max_frames: 0,
            stats_interval_frames: default_stats_interval(),
        }
    }
}

/// Pixel format requested from a V4L2 device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Packed YUV 4:2:2, converted to RGB on the host
    #[default]
    Yuyv,

    /// Packed 24-bit RGB, passed through untouched
    Rgb3,
}

/// Camera source settings not covered by the CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub pixel_format: PixelFormat,

    /// Frame rate hint (0 = driver default)
    #[serde(default)]
    pub fps: u32,

    /// Serve a synthetic test pattern instead of opening a device
    #[serde(default)]
    pub test_pattern: bool,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_server_name() -> String {
    env!("CARGO_PKG_NAME").replace('_', "-")
}
fn default_device_failure_limit() -> u32 {
    3
}
fn default_boundary() -> String {
    "BoundaryString".to_string()
}
fn default_quality() -> u8 {
    80
}
fn default_stats_interval() -> u64 {
    100
}

impl Config {
    /// Loads configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Loads configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let stream = &self.stream;

        if stream.jpeg_quality == 0 || stream.jpeg_quality > 100 {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                stream.jpeg_quality
            )));
        }

        validate_boundary(&stream.boundary)
            .map_err(|e| ConfigError::Invalid(format!("boundary: {}", e)))?;

        let name = &self.server.server_name;
        if name.is_empty() || name.chars().any(|c| c.is_control()) {
            return Err(ConfigError::Invalid(
                "server_name must be non-empty printable text".to_string(),
            ));
        }

        if self.capture.fps > 240 {
            return Err(ConfigError::Invalid(format!(
                "fps must be between 0 and 240, got {}",
                self.capture.fps
            )));
        }

        Ok(())
    }

    /// Saves configuration to TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
