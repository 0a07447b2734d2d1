use std::io;
use std::net::SocketAddr;
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use mio::net::TcpListener;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{info, trace};

use crate::error::SelectError;
use crate::selector::{SelectInterest, Selectable, SelectorHandle};
use crate::socket::{AsyncSocket, SocketOptions};

/// Lifecycle of an [`AsyncServerSocket`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle = 0,
    Bound = 1,
    Closed = 2,
}

/// A listening TCP socket driven by a selector.
#[derive(Debug)]
pub struct AsyncServerSocket {
    listener: TcpListener,
    selectable: Arc<Selectable>,
    selector: SelectorHandle,
    options: SocketOptions,
    state: AtomicU8,
    accepting: AtomicBool,
}

// clears the accepting flag however the accept future ends
struct AcceptGuard<'a>(&'a AtomicBool);

impl Drop for AcceptGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AsyncServerSocket {
    /// Binds and listens on `address`, an ephemeral port on all interfaces
    /// when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket can't be created, bound or put in
    /// listening mode.
    pub fn bind(selector: &SelectorHandle, address: Option<SocketAddr>, options: SocketOptions) -> io::Result<Self> {
        let address = address.unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));

        let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))?;
        if options.reuse_address {
            socket.set_reuse_address(true)?;
        }
        socket.set_nonblocking(true)?;
        socket.bind(&address.into())?;
        socket.listen(options.backlog)?;

        let listener = TcpListener::from_std(socket.into());
        let selectable = selector.selectable(listener.as_raw_fd());

        let server = Self {
            listener,
            selectable,
            selector: selector.clone(),
            options,
            state: AtomicU8::new(ServerState::Idle as u8),
            accepting: AtomicBool::new(false),
        };
        server.state.store(ServerState::Bound as u8, Ordering::Release);

        info!(address = %server.local_addr()?, "server socket bound");
        Ok(server)
    }

    pub fn state(&self) -> ServerState {
        match self.state.load(Ordering::Acquire) {
            0 => ServerState::Idle,
            1 => ServerState::Bound,
            _ => ServerState::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ServerState::Closed
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts one connection, suspending until one is ready.
    ///
    /// Only one accept may be outstanding at a time.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::Closed`] (as an io error) once the listener is
    /// closed, and the OS error if the accept itself failed.
    pub async fn accept(&self) -> io::Result<AsyncSocket> {
        let was_accepting = self.accepting.swap(true, Ordering::AcqRel);
        debug_assert!(!was_accepting, "only one accept may be outstanding on a server socket");
        let _guard = AcceptGuard(&self.accepting);

        loop {
            if self.is_closed() {
                return Err(SelectError::Closed.into());
            }

            match self.listener.accept() {
                Ok((stream, peer)) => {
                    trace!(%peer, "connection accepted");
                    return AsyncSocket::from_accepted(&self.selector, stream, &self.options);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.selectable.ready(&self.selector, SelectInterest::Accept).await?;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Closes the listener. A suspended accept fails with [`SelectError::Closed`].
    pub fn close(&self) {
        if self.state.swap(ServerState::Closed as u8, Ordering::AcqRel) == ServerState::Closed as u8 {
            return;
        }
        self.selector.notify_closed(&self.selectable);
        info!("server socket closed");
    }
}

impl Drop for AsyncServerSocket {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SelectorManager;
    use std::time::Duration;

    #[tokio::test]
    async fn bind_ephemeral_port() {
        let selector = SelectorManager::new().unwrap();
        let server = AsyncServerSocket::bind(&selector.handle(), None, SocketOptions::default()).unwrap();

        assert_eq!(server.state(), ServerState::Bound);
        let address = server.local_addr().unwrap();
        assert_ne!(address.port(), 0);
        assert!(address.ip().is_unspecified());
    }

    #[tokio::test]
    async fn accept_wraps_connected_socket() {
        let selector = SelectorManager::new().unwrap();
        let handle = selector.handle();
        let server = AsyncServerSocket::bind(&handle, Some("127.0.0.1:0".parse().unwrap()), SocketOptions::default()).unwrap();
        let address = server.local_addr().unwrap();

        // completes through the backlog before the accept
        let client = std::net::TcpStream::connect(address).unwrap();
        let accepted = tokio::time::timeout(Duration::from_secs(5), server.accept()).await.unwrap().unwrap();

        assert_eq!(accepted.state(), crate::socket::SocketState::Connected);
        assert_eq!(accepted.peer_addr().unwrap(), client.local_addr().unwrap());
    }

    #[tokio::test]
    async fn close_resumes_pending_accept() {
        let selector = SelectorManager::new().unwrap();
        let server = Arc::new(AsyncServerSocket::bind(&selector.handle(), Some("127.0.0.1:0".parse().unwrap()), SocketOptions::default()).unwrap());

        let pending = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.accept().await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        server.close();
        server.close();
        assert!(server.is_closed());

        let error = tokio::time::timeout(Duration::from_secs(5), pending).await.unwrap().unwrap().unwrap_err();
        assert!(SelectError::is_terminal(&error));
    }
}
