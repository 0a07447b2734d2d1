//! HTTP/1.1 wire decoding.
//!
//! - [`parse_request`] / [`parse_response`]: read one message head into a
//!   pooled buffer
//! - [`body`]: decide how the body is framed and copy it out
//!
//! # Example
//!
//! ```
//! use cio_http::codec::{expect_http_body, parse_request};
//! use cio_http::pools::{HttpPools, PoolConfig};
//! use cio_http::protocol::HttpMethod;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let pools = HttpPools::new(&PoolConfig::default()).unwrap();
//! let mut input: &[u8] = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
//!
//! let request = parse_request(&mut input, &pools).await.unwrap().unwrap();
//! assert_eq!(request.method(), HttpMethod::Get);
//! assert_eq!(request.header("host").unwrap(), "localhost");
//! assert!(!expect_http_body(&request));
//! # }
//! ```

mod ascii_tree;
pub mod body;
mod line;
mod request_decoder;

pub use body::BodyFraming;
pub use body::expect_http_body;
pub use body::parse_http_body;
pub use request_decoder::HEADER_LINE_LIMIT;
pub use request_decoder::START_LINE_LIMIT;
pub use request_decoder::parse_request;
pub use request_decoder::parse_response;
