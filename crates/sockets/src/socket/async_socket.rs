use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::task::{Context, Poll, ready};

use mio::net::TcpStream;
use std::os::fd::AsRawFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::{debug, trace};

use crate::error::SelectError;
use crate::selector::{SelectInterest, Selectable, SelectorHandle};
use crate::socket::SocketOptions;

/// Lifecycle of an [`AsyncSocket`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Idle = 0,
    Connecting = 1,
    Connected = 2,
    Closed = 3,
}

impl SocketState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SocketState::Idle,
            1 => SocketState::Connecting,
            2 => SocketState::Connected,
            _ => SocketState::Closed,
        }
    }
}

#[derive(Debug)]
struct SocketInner {
    stream: TcpStream,
    selectable: Arc<Selectable>,
    selector: SelectorHandle,
    state: AtomicU8,
}

/// A non-blocking TCP connection driven by a selector.
///
/// Every operation first tries the socket directly and only suspends on the
/// selector when the OS reports `WouldBlock`. Use [`into_split`](Self::into_split)
/// to read and write from different tasks.
#[derive(Debug)]
pub struct AsyncSocket {
    inner: Arc<SocketInner>,
}

/// The reading half of a split [`AsyncSocket`].
#[derive(Debug)]
pub struct ReadHalf {
    inner: Arc<SocketInner>,
}

/// The writing half of a split [`AsyncSocket`].
#[derive(Debug)]
pub struct WriteHalf {
    inner: Arc<SocketInner>,
}

impl AsyncSocket {
    /// Opens a connection to `address`, suspending until the OS reports the
    /// outcome of the non-blocking connect.
    ///
    /// # Errors
    ///
    /// Returns the connect failure reported by the OS, or a [`SelectError`]
    /// converted into an io error if the selector was closed meanwhile.
    pub async fn connect(selector: &SelectorHandle, address: SocketAddr, options: &SocketOptions) -> io::Result<Self> {
        let stream = TcpStream::connect(address)?;
        let socket = Self::wrap(selector, stream, SocketState::Connecting);

        loop {
            socket.inner.selectable.ready(&socket.inner.selector, SelectInterest::Connect).await?;

            if let Some(e) = socket.inner.stream.take_error()? {
                return Err(e);
            }

            match socket.inner.stream.peer_addr() {
                Ok(_) => break,
                // spurious wake up, the connect is still in progress
                Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
                Err(e) => return Err(e),
            }
        }

        socket.inner.stream.set_nodelay(options.nodelay)?;
        socket.inner.set_state(SocketState::Connected);
        debug!(%address, "socket connected");
        Ok(socket)
    }

    pub(crate) fn from_accepted(selector: &SelectorHandle, stream: TcpStream, options: &SocketOptions) -> io::Result<Self> {
        stream.set_nodelay(options.nodelay)?;
        Ok(Self::wrap(selector, stream, SocketState::Connected))
    }

    fn wrap(selector: &SelectorHandle, stream: TcpStream, state: SocketState) -> Self {
        let selectable = selector.selectable(stream.as_raw_fd());
        Self { inner: Arc::new(SocketInner { stream, selectable, selector: selector.clone(), state: AtomicU8::new(state as u8) }) }
    }

    pub fn state(&self) -> SocketState {
        self.inner.state()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state() == SocketState::Closed
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.stream.local_addr()
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.inner.stream.peer_addr()
    }

    /// Reads into `buf`, suspending until at least one byte is available.
    ///
    /// Returns `0` once the peer closed its writing side.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is closed or the read failed.
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        std::future::poll_fn(|cx| self.inner.poll_read(cx, buf)).await
    }

    /// Writes the whole buffer, suspending as often as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is closed or a write failed.
    pub async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf).await
    }

    /// Closes the socket. Suspended operations fail with [`SelectError::Closed`].
    pub fn close(&self) {
        self.inner.close();
    }

    /// Splits the socket into halves that can be used from different tasks.
    ///
    /// The connection is closed once both halves are dropped, or as soon as
    /// either half is explicitly closed.
    pub fn into_split(self) -> (ReadHalf, WriteHalf) {
        (ReadHalf { inner: Arc::clone(&self.inner) }, WriteHalf { inner: self.inner })
    }
}

impl SocketInner {
    fn state(&self) -> SocketState {
        SocketState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SocketState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.state() == SocketState::Closed {
            return Err(SelectError::Closed.into());
        }
        Ok(())
    }

    fn poll_read(&self, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
        loop {
            self.ensure_open()?;

            match (&self.stream).read(buf) {
                Ok(n) => return Poll::Ready(Ok(n)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    ready!(self.selectable.poll_ready(cx, &self.selector, SelectInterest::Read))?;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Poll::Ready(Err(e)),
            }
        }
    }

    fn poll_write(&self, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        loop {
            self.ensure_open()?;

            match (&self.stream).write(buf) {
                Ok(n) => return Poll::Ready(Ok(n)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    ready!(self.selectable.poll_ready(cx, &self.selector, SelectInterest::Write))?;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Poll::Ready(Err(e)),
            }
        }
    }

    async fn write_all(&self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            let n = std::future::poll_fn(|cx| self.poll_write(cx, buf)).await?;
            if n == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    fn poll_shutdown(&self) -> Poll<io::Result<()>> {
        self.ensure_open()?;
        match self.stream.shutdown(Shutdown::Write) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Poll::Ready(Err(e)),
            _ => Poll::Ready(Ok(())),
        }
    }

    fn close(&self) {
        let previous = SocketState::from_u8(self.state.swap(SocketState::Closed as u8, Ordering::AcqRel));
        if previous == SocketState::Closed {
            return;
        }

        self.selector.notify_closed(&self.selectable);
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            trace!(cause = %e, "shutdown of closing socket failed");
        }
    }
}

impl Drop for SocketInner {
    fn drop(&mut self) {
        self.close();
    }
}

impl ReadHalf {
    /// See [`AsyncSocket::read`].
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is closed or the read failed.
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        std::future::poll_fn(|cx| self.inner.poll_read(cx, buf)).await
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state() == SocketState::Closed
    }

    /// Closes the whole connection, the write half included.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl WriteHalf {
    /// See [`AsyncSocket::write`].
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is closed or a write failed.
    pub async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf).await
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state() == SocketState::Closed
    }

    /// Closes the whole connection, the read half included.
    pub fn close(&self) {
        self.inner.close();
    }
}

fn poll_read_buf(inner: &SocketInner, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
    let n = ready!(inner.poll_read(cx, buf.initialize_unfilled()))?;
    buf.advance(n);
    Poll::Ready(Ok(()))
}

impl AsyncRead for ReadHalf {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        poll_read_buf(&self.inner, cx, buf)
    }
}

impl AsyncRead for AsyncSocket {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        poll_read_buf(&self.inner, cx, buf)
    }
}

impl AsyncWrite for WriteHalf {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.inner.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.inner.poll_shutdown()
    }
}

impl AsyncWrite for AsyncSocket {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.inner.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.inner.poll_shutdown()
    }
}
