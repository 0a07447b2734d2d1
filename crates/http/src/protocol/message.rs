use std::fmt;

use crate::buffer::{CharBufferBuilder, CharSeq, TextRef};
use crate::protocol::headers::HeaderTable;
use crate::protocol::{HttpHeaders, HttpMethod};

/// A parsed request head.
///
/// The request owns the pooled buffer its text lives in and the pooled
/// header index. Every accessor returns a view borrowing the request, so no
/// view can outlive [`release`](Request::release).
pub struct Request {
    method: HttpMethod,
    method_text: TextRef,
    uri: TextRef,
    version: TextRef,
    headers: HeaderTable,
    builder: CharBufferBuilder,
}

impl Request {
    pub(crate) fn new(
        method: HttpMethod,
        method_text: TextRef,
        uri: TextRef,
        version: TextRef,
        headers: HeaderTable,
        builder: CharBufferBuilder,
    ) -> Self {
        Self { method, method_text, uri, version, headers, builder }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The method token as sent, also for [`HttpMethod::Custom`].
    pub fn method_name(&self) -> CharSeq<'_> {
        self.method_text.resolve(&self.builder)
    }

    pub fn uri(&self) -> CharSeq<'_> {
        self.uri.resolve(&self.builder)
    }

    pub fn version(&self) -> CharSeq<'_> {
        self.version.resolve(&self.builder)
    }

    pub fn headers(&self) -> HttpHeaders<'_> {
        HttpHeaders::new(&self.headers, &self.builder)
    }

    /// Shorthand for `self.headers().get(name)`.
    pub fn header(&self, name: &str) -> Option<CharSeq<'_>> {
        self.headers().get(name)
    }

    /// Gives the buffer chunks and the header index back to their pools.
    ///
    /// Dropping the request does the same.
    pub fn release(self) {
        drop(self);
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method_name())
            .field("uri", &self.uri())
            .field("version", &self.version())
            .field("headers", &self.headers())
            .finish()
    }
}

/// A parsed response head: version, status code, status text and headers.
pub struct Response {
    version: TextRef,
    status: u16,
    status_text: TextRef,
    headers: HeaderTable,
    builder: CharBufferBuilder,
}

impl Response {
    pub(crate) fn new(version: TextRef, status: u16, status_text: TextRef, headers: HeaderTable, builder: CharBufferBuilder) -> Self {
        Self { version, status, status_text, headers, builder }
    }

    pub fn version(&self) -> CharSeq<'_> {
        self.version.resolve(&self.builder)
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> CharSeq<'_> {
        self.status_text.resolve(&self.builder)
    }

    pub fn headers(&self) -> HttpHeaders<'_> {
        HttpHeaders::new(&self.headers, &self.builder)
    }

    pub fn header(&self, name: &str) -> Option<CharSeq<'_>> {
        self.headers().get(name)
    }

    pub fn release(self) {
        drop(self);
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("version", &self.version())
            .field("status", &self.status)
            .field("status_text", &self.status_text())
            .field("headers", &self.headers())
            .finish()
    }
}
