//! An HTTP/1.1 server over readiness driven sockets.
//!
//! ```no_run
//! use std::convert::Infallible;
//! use cio_http::connection::RequestBody;
//! use cio_http::handler::make_handler;
//! use cio_http::protocol::{HttpResponse, Request};
//! use cio_http::server::HttpServer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = HttpServer::builder()
//!         .address("127.0.0.1:8080".parse().unwrap())
//!         .handler(make_handler(|_request: Request, _body: RequestBody| async {
//!             Ok::<_, Infallible>(HttpResponse::ok().body("Hello World!\r\n"))
//!         }))
//!         .build()
//!         .unwrap();
//!
//!     server.run().await;
//! }
//! ```

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use cio_sockets::PoolError;
use cio_sockets::selector::SelectorManager;
use cio_sockets::socket::{AsyncServerSocket, AsyncSocket, SocketOptions, accept_loop};
use thiserror::Error;
use tracing::{error, info};

use crate::connection::{HttpConnection, PipelineConfig};
use crate::handler::Handler;
use crate::pools::{HttpPools, PoolConfig};

pub struct ServerBuilder {
    address: Option<SocketAddr>,
    socket_options: SocketOptions,
    pools: PoolConfig,
    pipeline: PipelineConfig,
    handler: Option<Arc<dyn Handler>>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            address: None,
            socket_options: SocketOptions::default(),
            pools: PoolConfig::default(),
            pipeline: PipelineConfig::default(),
            handler: None,
        }
    }

    /// The address to listen on. Without one the server binds an ephemeral
    /// port on the wildcard address.
    pub fn address(mut self, address: SocketAddr) -> Self {
        self.address = Some(address);
        self
    }

    pub fn socket_options(mut self, options: SocketOptions) -> Self {
        self.socket_options = options;
        self
    }

    pub fn pools(mut self, config: PoolConfig) -> Self {
        self.pools = config;
        self
    }

    pub fn pipeline(mut self, config: PipelineConfig) -> Self {
        self.pipeline = config;
        self
    }

    pub fn handler(mut self, handler: impl Handler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Starts the selector and binds the listener.
    ///
    /// # Errors
    ///
    /// Fails if no handler was set, if the pools are misconfigured or if the
    /// listener can't be bound.
    pub fn build(self) -> Result<HttpServer, ServerBuildError> {
        let handler = self.handler.ok_or(ServerBuildError::MissingHandler)?;
        let pools = HttpPools::new(&self.pools)?;

        let selector = SelectorManager::new()?;
        let listener = AsyncServerSocket::bind(&selector.handle(), self.address, self.socket_options)?;

        Ok(HttpServer { listener, selector, handler, pools, pipeline: self.pipeline })
    }
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("address", &self.address)
            .field("socket_options", &self.socket_options)
            .field("pools", &self.pools)
            .field("pipeline", &self.pipeline)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("handler must be set")]
    MissingHandler,
    #[error("invalid pool configuration: {0}")]
    Pool(#[from] PoolError),
    #[error("can't start listening: {0}")]
    Io(#[from] io::Error),
}

/// A bound HTTP server. Each accepted connection is served by an
/// [`HttpConnection`] on its own task.
pub struct HttpServer {
    // dropped before the selector it is registered with
    listener: AsyncServerSocket,
    selector: SelectorManager,
    handler: Arc<dyn Handler>,
    pools: HttpPools,
    pipeline: PipelineConfig,
}

impl HttpServer {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the address can't be queried.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts and serves connections until [`close`](Self::close) is called.
    pub async fn run(&self) {
        accept_loop(&self.listener, |socket| self.serve(socket)).await;
        info!("server stopped accepting connections");
    }

    /// Stops accepting connections. Connections already accepted are served
    /// until their peers close them.
    pub fn close(&self) {
        self.listener.close();
    }

    fn serve(&self, socket: AsyncSocket) {
        let peer = socket.peer_addr().ok();
        let (reader, writer) = socket.into_split();
        let connection = HttpConnection::with_config(reader, writer, self.pools.clone(), self.pipeline);
        let handler = Arc::clone(&self.handler);

        tokio::spawn(async move {
            match connection.process(handler).await {
                Ok(()) => info!(?peer, "finished process, connection shutdown"),
                Err(e) => error!(?peer, cause = %e, "service has error, connection shutdown"),
            }
        });
    }
}

impl fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServer")
            .field("listener", &self.listener)
            .field("selector", &self.selector)
            .field("pools", &self.pools)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::RequestBody;
    use crate::handler::make_handler;
    use crate::protocol::{HttpResponse, Request};
    use std::convert::Infallible;

    #[test]
    fn build_needs_a_handler() {
        let err = HttpServer::builder().build().unwrap_err();
        assert!(matches!(err, ServerBuildError::MissingHandler));
    }

    #[tokio::test]
    async fn close_stops_run() {
        let server = HttpServer::builder()
            .address("127.0.0.1:0".parse().unwrap())
            .handler(make_handler(|_request: Request, _body: RequestBody| async { Ok::<_, Infallible>(HttpResponse::ok()) }))
            .build()
            .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);

        let server = Arc::new(server);
        let running = tokio::spawn({
            let server = Arc::clone(&server);
            async move { server.run().await }
        });

        server.close();
        running.await.unwrap();
    }
}
