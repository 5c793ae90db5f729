//! Startup behavior of the `mjpeg-server` binary

use std::net::TcpListener;
use std::process::Command;

fn server_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_mjpeg-server"))
}

#[test]
fn test_missing_arguments_print_usage() {
    let output = server_bin().args(["8080", "640"]).output().unwrap();
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr: {}", stderr);
}

#[test]
fn test_zero_width_rejected() {
    let output = server_bin().args(["8080", "0", "480", "0"]).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_missing_device_fails_before_bind() {
    // Hold the port so a bind attempt would fail with a different error
    let taken = TcpListener::bind("0.0.0.0:0").unwrap();
    let port = taken.local_addr().unwrap().port().to_string();

    let output = server_bin()
        .args([port.as_str(), "640", "480", "9999"])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("capture device 9999 unavailable"), "stderr: {}", stderr);
    assert!(!stderr.contains("failed to bind"), "stderr: {}", stderr);
}
