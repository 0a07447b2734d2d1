use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, DuplexStream, ReadBuf};
use tracing::trace;

/// The body of a request, streamed by the connection while the handler runs.
///
/// Reading returns end of stream once the whole body was received. A handler
/// may drop the body without reading it; the connection then discards the
/// remaining bytes.
#[derive(Debug, Default)]
pub struct RequestBody {
    inner: Option<DuplexStream>,
}

impl RequestBody {
    pub(crate) fn new(stream: DuplexStream) -> Self {
        Self { inner: Some(stream) }
    }

    /// A body for requests announcing none.
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// Returns `true` if the request announced no body at all.
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Reads the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns the error that interrupted the read.
    pub async fn bytes(mut self) -> io::Result<Bytes> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

impl AsyncRead for RequestBody {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.inner.as_mut() {
            Some(stream) => Pin::new(stream).poll_read(cx, buf),
            None => Poll::Ready(Ok(())),
        }
    }
}

/// Writes to the request body pipe, dropping everything once the handler
/// closed its end so the connection can still skip over the body.
#[derive(Debug)]
pub(crate) struct DiscardOnClose<W> {
    inner: W,
    discarding: bool,
}

impl<W> DiscardOnClose<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, discarding: false }
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for DiscardOnClose<W> {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if self.discarding {
            return Poll::Ready(Ok(buf.len()));
        }

        match Pin::new(&mut self.inner).poll_write(cx, buf) {
            Poll::Ready(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                trace!("request body dropped by the handler, discarding the rest");
                self.discarding = true;
                Poll::Ready(Ok(buf.len()))
            }
            other => other,
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.discarding {
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.discarding {
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn read_whole_body() {
        let (mut writer, reader) = tokio::io::duplex(4);
        let body = RequestBody::new(reader);

        let send = tokio::spawn(async move {
            writer.write_all(b"hello body").await.unwrap();
            writer.shutdown().await.unwrap();
        });

        assert_eq!(body.bytes().await.unwrap(), Bytes::from_static(b"hello body"));
        send.await.unwrap();

        let body = RequestBody::empty();
        assert!(body.is_empty());
        assert!(body.bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn discard_after_reader_dropped() {
        let (writer, reader) = tokio::io::duplex(4);
        let mut writer = DiscardOnClose::new(writer);

        writer.write_all(b"ab").await.unwrap();
        drop(reader);

        writer.write_all(b"the rest of a long body").await.unwrap();
        writer.shutdown().await.unwrap();
        assert!(writer.discarding);
    }
}
