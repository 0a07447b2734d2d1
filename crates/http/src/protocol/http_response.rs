//! Outgoing responses.
//!
//! Handlers build an [`HttpResponse`] and the connection engine serializes it
//! into the response slot of the request. The body is always sent with a
//! `Content-Length` computed from its size.

use std::fmt::Write;

use bytes::{BufMut, Bytes, BytesMut};

use crate::ensure;
use crate::protocol::SendError;

/// Initial buffer size reserved for the status line and the headers.
const INIT_HEADER_SIZE: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self { status, headers: Vec::new(), body: Bytes::new() }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Appends a header. `Content-Length` is ignored, it is always derived
    /// from the body.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.headers.push((name.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    /// Serializes the status line, the headers and the body into `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::InvalidStatus`] if the status isn't three digits
    /// and [`SendError::InvalidHeader`] if a header name is empty or a name or
    /// value contains a line break.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), SendError> {
        ensure!((100..=999).contains(&self.status), SendError::invalid_status(self.status));

        dst.reserve(INIT_HEADER_SIZE + self.body.len());
        write!(dst, "HTTP/1.1 {} {}\r\n", self.status, canonical_reason(self.status))
            .map_err(|e| SendError::invalid_body(format!("can't write status line: {e}")))?;

        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            ensure!(!name.is_empty(), SendError::invalid_header(name, "empty name"));
            ensure!(!has_line_break(name) && !has_line_break(value), SendError::invalid_header(name, "line break in header"));

            dst.put_slice(name.as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_slice(b"\r\n");
        }

        write!(dst, "Content-Length: {}\r\n\r\n", self.body.len()).map_err(|e| SendError::invalid_body(format!("can't write content length: {e}")))?;
        dst.put_slice(&self.body);
        Ok(())
    }
}

fn has_line_break(text: &str) -> bool {
    text.bytes().any(|b| b == b'\r' || b == b'\n')
}

/// The reason phrase sent for `status`.
pub fn canonical_reason(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        411 => "Length Required",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn encode_with_body() {
        let response = HttpResponse::ok().header("Content-Type", "text/plain").header("Content-Length", 99).body("Hello World!");

        let mut dst = BytesMut::new();
        response.encode(&mut dst).unwrap();

        let expected = indoc! {"
            HTTP/1.1 200 OK\r
            Content-Type: text/plain\r
            Content-Length: 12\r
            \r
            Hello World!"};
        assert_eq!(std::str::from_utf8(&dst).unwrap(), expected);
    }

    #[test]
    fn encode_empty_error() {
        let mut dst = BytesMut::new();
        HttpResponse::new(500).encode(&mut dst).unwrap();
        assert_eq!(&dst[..], b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n");
    }

    #[test]
    fn reject_header_injection() {
        let mut dst = BytesMut::new();
        let response = HttpResponse::ok().header("X-Evil", "a\r\nSet-Cookie: b");
        assert!(matches!(response.encode(&mut dst), Err(SendError::InvalidHeader { .. })));

        let response = HttpResponse::ok().header("", "value");
        assert!(response.encode(&mut dst).is_err());
    }

    #[test]
    fn status_must_have_three_digits() {
        for status in [0, 42, 99, 1000, u16::MAX] {
            let mut dst = BytesMut::new();
            let result = HttpResponse::new(status).encode(&mut dst);
            assert!(matches!(result, Err(SendError::InvalidStatus { status: s }) if s == status));
            assert!(dst.is_empty());
        }

        let mut dst = BytesMut::new();
        HttpResponse::new(999).encode(&mut dst).unwrap();
        assert!(dst.starts_with(b"HTTP/1.1 999 Unknown\r\n"));

        let mut dst = BytesMut::new();
        HttpResponse::new(100).encode(&mut dst).unwrap();
        assert!(dst.starts_with(b"HTTP/1.1 100 Continue\r\n"));
    }
}
