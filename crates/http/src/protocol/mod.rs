//! HTTP message types.
//!
//! - [`Request`] / [`Response`]: parsed message heads owning their pooled
//!   buffer, with [`HttpHeaders`] as the header view
//! - [`HttpMethod`]: the known methods plus a custom fallback
//! - [`HttpResponse`]: what handlers return, serialized by the connection
//! - [`HttpError`], [`ParseError`], [`SendError`]: the error types of the crate

mod error;
mod headers;
mod http_response;
mod message;
mod method;

pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
pub(crate) use headers::HeaderEntry;
pub(crate) use headers::HeaderTable;
pub use headers::HttpHeaders;
pub use http_response::HttpResponse;
pub use http_response::canonical_reason;
pub use message::Request;
pub use message::Response;
pub use method::HttpMethod;

/// Header entries a message can hold.
pub const EXPECTED_HEADERS_QTY: usize = 32;

/// `u32` slots per header entry: name hash, value hash, name start, name
/// end, value start, value end.
pub const HEADER_SIZE: usize = 6;
