//! `multipart/x-mixed-replace` framing for MJPEG over HTTP
//!
//! Browsers render each part as it arrives, replacing the previous one, so
//! `<img src="http://host:port/">` is enough to show the live feed.
//!
//! Per frame the wire carries exactly:
//!
//! ```text
//! --<boundary>\r\n
//! Content-type: image/jpg\r\n
//! Content-Length: <n>\r\n
//! \r\n
//! <n bytes of JPEG>\r\n
//! \r\n
//! ```

use bytes::Bytes;
use thiserror::Error;

use crate::encoder::EncodedImage;

/// Boundary tokens are limited to 70 characters by RFC 2046.
pub const MAX_BOUNDARY_LEN: usize = 70;

const FRAME_TAIL: &[u8] = b"\r\n\r\n";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BoundaryError {
    #[error("boundary token is empty")]
    Empty,

    #[error("boundary token is {0} characters, limit is 70")]
    TooLong(usize),

    #[error("boundary token contains invalid character {0:?}")]
    InvalidChar(char),

    #[error("boundary token must not start with \"--\"")]
    LeadingDashes,
}

/// Checks a token against the RFC 2046 boundary alphabet (spaces excluded).
///
/// The `--` delimiter prefix is added on the wire, so it is not part of the
/// token itself.
pub fn validate_boundary(token: &str) -> Result<(), BoundaryError> {
    if token.is_empty() {
        return Err(BoundaryError::Empty);
    }
    if token.len() > MAX_BOUNDARY_LEN {
        return Err(BoundaryError::TooLong(token.len()));
    }
    if token.starts_with("--") {
        return Err(BoundaryError::LeadingDashes);
    }
    match token.chars().find(|c| !is_bchar(*c)) {
        Some(c) => Err(BoundaryError::InvalidChar(c)),
        None => Ok(()),
    }
}

fn is_bchar(c: char) -> bool {
    c.is_ascii_alphanumeric() || "'()+_,-./:=?".contains(c)
}

/// Immutable framing state shared by every session.
///
/// The response header is rendered once at construction; per-frame heads
/// reuse the same boundary token, so header and frames can never disagree.
#[derive(Debug, Clone)]
pub struct MultipartFramer {
    boundary: String,
    header: Bytes,
}

impl MultipartFramer {
    pub fn new(boundary: &str, server_name: &str) -> Result<Self, BoundaryError> {
        validate_boundary(boundary)?;

        let header = format!(
            "HTTP/1.0 200 OK\r\n\
             Server: {server}\r\n\
             Connection: close\r\n\
             Max-Age: 0\r\n\
             Expires: 0\r\n\
             Cache-Control: no-cache, private\r\n\
             Pragma: no-cache\r\n\
             Content-Type: multipart/x-mixed-replace; boundary={boundary}\r\n\
             \r\n",
            server = server_name,
            boundary = boundary,
        );

        Ok(Self {
            boundary: boundary.to_string(),
            header: Bytes::from(header),
        })
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// HTTP response header, sent once before the first frame.
    pub fn initial_header(&self) -> &[u8] {
        &self.header
    }

    /// Boundary line and part headers for a payload of `content_length` bytes.
    pub fn envelope_head(&self, content_length: usize) -> Bytes {
        Bytes::from(format!(
            "--{}\r\nContent-type: image/jpg\r\nContent-Length: {}\r\n\r\n",
            self.boundary, content_length
        ))
    }

    /// Envelope head sized from the image itself.
    pub fn frame_envelope_head(&self, image: &EncodedImage) -> Bytes {
        self.envelope_head(image.len())
    }

    /// Terminator written after the JPEG bytes.
    pub fn frame_envelope_tail(&self) -> &'static [u8] {
        FRAME_TAIL
    }

    /// Head, payload and tail in one buffer.
    pub fn envelope(&self, image: &EncodedImage) -> Bytes {
        let head = self.frame_envelope_head(image);
        let mut part = Vec::with_capacity(head.len() + image.len() + FRAME_TAIL.len());
        part.extend_from_slice(&head);
        part.extend_from_slice(image.as_bytes());
        part.extend_from_slice(FRAME_TAIL);
        Bytes::from(part)
    }
}

impl Default for MultipartFramer {
    fn default() -> Self {
        Self {
            boundary: "BoundaryString".to_string(),
            header: Bytes::from_static(
                b"HTTP/1.0 200 OK\r\n\
                  Server: mjpeg-server\r\n\
                  Connection: close\r\n\
                  Max-Age: 0\r\n\
                  Expires: 0\r\n\
                  Cache-Control: no-cache, private\r\n\
                  Pragma: no-cache\r\n\
                  Content-Type: multipart/x-mixed-replace; boundary=BoundaryString\r\n\
                  \r\n",
            ),
        }
    }
}
