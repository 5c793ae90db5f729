//! Helpers for reading an MJPEG stream back off the wire

#![allow(dead_code)]

use std::io::{BufRead, Read};

/// One parsed multipart part.
pub struct Part {
    pub boundary_line: String,
    pub content_type: String,
    pub content_length: usize,
    pub payload: Vec<u8>,
}

/// Reads the next part, or `None` on a clean end of stream.
pub fn read_part<R: BufRead>(reader: &mut R) -> Option<Part> {
    let mut boundary_line = String::new();
    if reader.read_line(&mut boundary_line).ok()? == 0 {
        return None;
    }

    let mut content_type = String::new();
    let mut content_length = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        if line == "\r\n" {
            break;
        }
        if let Some(value) = line.strip_prefix("Content-type: ") {
            content_type = value.trim_end().to_string();
        } else if let Some(value) = line.strip_prefix("Content-Length: ") {
            content_length = value.trim_end().parse().ok();
        }
    }

    let content_length = content_length?;
    let mut payload = vec![0u8; content_length];
    reader.read_exact(&mut payload).ok()?;

    let mut tail = [0u8; 4];
    reader.read_exact(&mut tail).ok()?;
    assert_eq!(&tail, b"\r\n\r\n", "part not terminated by blank line");

    Some(Part {
        boundary_line,
        content_type,
        content_length,
        payload,
    })
}

/// Splits a complete body (header already removed) into parts.
pub fn parse_parts(body: &[u8]) -> Vec<Part> {
    let mut reader = body;
    let mut parts = Vec::new();
    while let Some(part) = read_part(&mut reader) {
        parts.push(part);
    }
    assert!(reader.is_empty(), "{} trailing bytes after last part", reader.len());
    parts
}
