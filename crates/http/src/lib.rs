//! A pipelined HTTP/1.1 engine over readiness driven sockets.
//!
//! Requests are parsed straight into pooled character buffers: the request
//! line and the headers are views over one buffer, nothing is copied until a
//! caller asks for an owned value. Consecutive requests on one connection are
//! handled concurrently and their responses are written back in request
//! order.
//!
//! # Example
//!
//! ```no_run
//! use cio_http::connection::RequestBody;
//! use cio_http::handler::make_handler;
//! use cio_http::protocol::{HttpResponse, Request};
//! use cio_http::server::HttpServer;
//! use std::error::Error;
//! use tracing::{info, Level};
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     let server = HttpServer::builder()
//!         .address("127.0.0.1:8080".parse().unwrap())
//!         .handler(make_handler(hello_world))
//!         .build()
//!         .expect("can't start the server");
//!
//!     server.run().await;
//! }
//!
//! async fn hello_world(request: Request, body: RequestBody) -> Result<HttpResponse, Box<dyn Error + Send + Sync>> {
//!     info!(uri = %request.uri(), "request received");
//!     request.release();
//!
//!     let body = body.bytes().await?;
//!     info!(body = %String::from_utf8_lossy(&body), "receiving request body");
//!
//!     Ok(HttpResponse::ok().header("Content-Type", "text/plain").body("Hello World!\r\n"))
//! }
//! ```
//!
//! # Architecture
//!
//! - [`buffer`]: the pooled [`CharBufferBuilder`](buffer::CharBufferBuilder)
//!   and the [`CharSeq`](buffer::CharSeq) views over it
//! - [`pools`]: the object pools shared by every connection of a server
//! - [`protocol`]: requests, responses, headers and the error types
//! - [`codec`]: the request / response head parser and body framing
//! - [`connection`]: the pipelining engine
//! - [`handler`]: the request handler trait
//! - [`server`]: accepting connections and handing them to the engine
//!
//! # Limitations
//!
//! - HTTP/1.1 only, no TLS
//! - request lines are limited to 8 KiB, header lines to 4 KiB
//! - at most 32 headers per message
//! - `multipart` bodies without a `Content-Length` and transfer codings
//!   other than `chunked` are answered with `501 Not Implemented`

pub mod buffer;
pub mod codec;
pub mod connection;
pub mod handler;
pub mod pools;
pub mod protocol;
pub mod server;

mod utils;
pub(crate) use utils::ensure;
