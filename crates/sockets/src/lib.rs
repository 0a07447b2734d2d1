//! Readiness driven async sockets and lock-free object pools.
//!
//! This crate is the transport layer of `cio-http`. It provides:
//!
//! - [`selector`]: a reactor thread polling the OS for readiness and waking
//!   the tasks suspended on it
//! - [`socket`]: connect / read / write / accept that only suspend when the OS
//!   reports `WouldBlock`, with tokio `AsyncRead` / `AsyncWrite` adapters
//! - [`pool`]: bounded lock-free pools recycling fixed-shape buffers
//!
//! Only unix platforms are supported.
//!
//! # Example
//!
//! ```no_run
//! use cio_sockets::selector::SelectorManager;
//! use cio_sockets::socket::{accept_loop, AsyncServerSocket, SocketOptions};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let selector = SelectorManager::new()?;
//!     let server = AsyncServerSocket::bind(&selector.handle(), Some("127.0.0.1:8080".parse().unwrap()), SocketOptions::default())?;
//!
//!     accept_loop(&server, |socket| {
//!         tokio::spawn(async move {
//!             let (mut reader, mut writer) = socket.into_split();
//!             let _ = tokio::io::copy(&mut reader, &mut writer).await;
//!         });
//!     })
//!     .await;
//!     Ok(())
//! }
//! ```

#[cfg(not(unix))]
compile_error!("cio-sockets only supports unix platforms");

mod error;
pub mod pool;
pub mod selector;
pub mod socket;

pub use error::PoolError;
pub use error::SelectError;
