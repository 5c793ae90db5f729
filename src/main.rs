//! MJPEG-over-HTTP server CLI

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mjpeg_server::camera::{FrameSource, TestPattern, V4lCamera};
use mjpeg_server::config::Config;
use mjpeg_server::web_server::MjpegServer;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mjpeg-server")]
#[command(about = "Streams a V4L2 camera as MJPEG over HTTP")]
#[command(version)]
struct Cli {
    /// TCP port to listen on
    port: u16,

    /// Requested frame width in pixels
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    /// Requested frame height in pixels
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,

    /// Video device index (/dev/videoN)
    device: usize,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).with_target(false).init();

    info!("MJPEG server starting");

    let config = match &cli.config {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            Config::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?
        }
        None => Config::default(),
    };

    let mut source: Box<dyn FrameSource> = if config.capture.test_pattern {
        info!(
            width = cli.width,
            height = cli.height,
            fps = config.capture.fps,
            "Using synthetic test pattern"
        );
        Box::new(TestPattern::from_config(cli.width, cli.height, &config.capture))
    } else {
        match V4lCamera::open(cli.device, cli.width, cli.height, &config.capture) {
            Ok(camera) => {
                let (width, height) = camera.resolution();
                info!(
                    device = cli.device,
                    width,
                    height,
                    pixel_format = ?camera.pixel_format(),
                    "Camera opened"
                );
                Box::new(camera)
            }
            Err(e) => {
                error!(device = cli.device, error = %e, "Failed to open camera");
                return Err(e.into());
            }
        }
    };

    let result = MjpegServer::bind(&config, cli.port).and_then(|mut server| server.run(&mut source));

    source.release();

    if let Err(e) = result {
        error!(error = %e, "Server stopped");
        return Err(e.into());
    }

    info!("Shutting down");
    Ok(())
}
