//! Body framing and decoding.
//!
//! - [`BodyFraming`]: which of length, chunked or read-until-close applies
//! - [`ChunkedDecoder`]: the chunked transfer coding state machine
//! - [`expect_http_body`] and [`parse_http_body`]: the helpers the connection
//!   engine drives for each request

mod chunked_decoder;
mod framing;

pub use chunked_decoder::ChunkedDecoder;
pub use chunked_decoder::ChunkedItem;
pub use framing::BodyFraming;
pub use framing::expect_http_body;
pub use framing::parse_http_body;
