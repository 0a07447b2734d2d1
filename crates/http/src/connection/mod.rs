//! The pipelining connection engine.
//!
//! [`HttpConnection`] reads requests off one stream and writes their
//! responses to another, strictly in request order, while the handlers of
//! consecutive requests run concurrently. Request bodies reach the handler as
//! a streaming [`RequestBody`].

mod body;
mod config;
mod http_connection;

pub use body::RequestBody;
pub use config::PipelineConfig;
pub use http_connection::HttpConnection;
