use std::io;
use std::str::Utf8Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid request line: {reason}")]
    InvalidRequestLine { reason: String },

    #[error("invalid status code: {reason}")]
    InvalidStatusCode { reason: String },

    #[error("invalid header line: {reason}")]
    InvalidHeader { reason: String },

    #[error("multiple colons in header {name}")]
    MultipleColons { name: String },

    #[error("no value provided for header {name}")]
    MissingHeaderValue { name: String },

    #[error("line is longer than the limit {limit}")]
    TooLongLine { limit: usize },

    #[error("line is not valid utf-8: {source}")]
    InvalidUtf8 {
        #[from]
        source: Utf8Error,
    },

    #[error("invalid chunk: {reason}")]
    InvalidChunk { reason: String },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("unexpected end of stream while {context}")]
    UnexpectedEof { context: &'static str },

    #[error("not supported: {reason}")]
    NotSupported { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn invalid_request_line<S: ToString>(str: S) -> Self {
        Self::InvalidRequestLine { reason: str.to_string() }
    }

    pub fn invalid_status_code<S: ToString>(str: S) -> Self {
        Self::InvalidStatusCode { reason: str.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn multiple_colons<S: ToString>(name: S) -> Self {
        Self::MultipleColons { name: name.to_string() }
    }

    pub fn missing_header_value<S: ToString>(name: S) -> Self {
        Self::MissingHeaderValue { name: name.to_string() }
    }

    pub fn too_long_line(limit: usize) -> Self {
        Self::TooLongLine { limit }
    }

    pub fn invalid_chunk<S: ToString>(str: S) -> Self {
        Self::InvalidChunk { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn unexpected_eof(context: &'static str) -> Self {
        Self::UnexpectedEof { context }
    }

    pub fn not_supported<S: ToString>(str: S) -> Self {
        Self::NotSupported { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Returns true if the error comes from the transport rather than from
    /// the bytes the peer sent.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid status code {status}")]
    InvalidStatus { status: u16 },

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: &'static str },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_status(status: u16) -> Self {
        Self::InvalidStatus { status }
    }

    pub fn invalid_header<S: ToString>(name: S, reason: &'static str) -> Self {
        Self::InvalidHeader { name: name.to_string(), reason }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
