use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::codec::body::ChunkedDecoder;
use crate::ensure;
use crate::protocol::{HttpHeaders, ParseError, Request};

/// How the body of a message is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// No body follows the head.
    None,
    /// Exactly this many bytes follow.
    Length(u64),
    /// A chunked body follows.
    Chunked,
    /// The body runs until the peer closes its side.
    UntilClose,
}

impl BodyFraming {
    /// Determines the framing from the headers. First match wins:
    ///
    /// 1. `Content-Length`
    /// 2. `Transfer-Encoding: chunked`, any other coding is rejected
    /// 3. `Connection: close` reads until close
    /// 4. a `multipart/*` content type without a length is rejected
    /// 5. any other `Content-Type` reads until close
    ///
    /// # Errors
    ///
    /// - [`ParseError::InvalidContentLength`] if the length isn't a decimal number
    /// - [`ParseError::NotSupported`] for unknown transfer codings and multipart bodies
    pub fn of(headers: &HttpHeaders<'_>) -> Result<Self, ParseError> {
        if let Some(length) = headers.get("Content-Length") {
            return length.parse_decimal().map(BodyFraming::Length).ok_or_else(|| ParseError::invalid_content_length(length));
        }

        if let Some(coding) = headers.get("Transfer-Encoding") {
            ensure!(coding.eq_ignore_ascii_case("chunked"), ParseError::not_supported(format!("transfer encoding {coding}")));
            return Ok(BodyFraming::Chunked);
        }

        if headers.get("Connection").is_some_and(|connection| connection.starts_with_ignore_ascii_case("close")) {
            return Ok(BodyFraming::UntilClose);
        }

        match headers.get("Content-Type") {
            Some(content_type) => {
                ensure!(
                    !content_type.starts_with_ignore_ascii_case("multipart/"),
                    ParseError::not_supported(format!("{content_type} body without content-length"))
                );
                Ok(BodyFraming::UntilClose)
            }
            None => Ok(BodyFraming::None),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, BodyFraming::None | BodyFraming::Length(0))
    }

    /// Copies the framed body from `input` to `out`, returning the number of
    /// body bytes written. Bytes after the body stay in `input`. `out` is not
    /// shut down.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::UnexpectedEof`] if `input` ends inside a length
    /// or chunked body, [`ParseError::InvalidChunk`] on a malformed chunked
    /// body and [`ParseError::Io`] if reading or writing fails.
    pub async fn copy<R, W>(self, input: &mut R, out: &mut W) -> Result<u64, ParseError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let copied = match self {
            BodyFraming::None => 0,
            BodyFraming::Length(length) => copy_length(input, out, length).await?,
            BodyFraming::Chunked => ChunkedDecoder::new().decode_to(input, out).await?,
            BodyFraming::UntilClose => tokio::io::copy_buf(input, out).await?,
        };

        trace!(framing = ?self, copied, "copied request body");
        Ok(copied)
    }
}

async fn copy_length<R, W>(input: &mut R, out: &mut W, length: u64) -> Result<u64, ParseError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut remaining = length;
    while remaining > 0 {
        let available = input.fill_buf().await?;
        ensure!(!available.is_empty(), ParseError::unexpected_eof("reading a content-length body"));

        let len = usize::try_from(remaining).map_or(available.len(), |remaining| remaining.min(available.len()));
        out.write_all(&available[..len]).await?;
        input.consume(len);
        remaining -= len as u64;
    }
    Ok(length)
}

/// Tells whether a body follows the head of `request`.
///
/// `GET`, `HEAD` and `OPTIONS` requests never have one. Otherwise a
/// `Content-Length` other than `0`, a `Transfer-Encoding`, `Connection:
/// close` or a `Content-Type` announce one.
pub fn expect_http_body(request: &Request) -> bool {
    if request.method().is_bodyless() {
        return false;
    }

    let headers = request.headers();
    if let Some(length) = headers.get("Content-Length") {
        return length != "0";
    }

    headers.contains("Transfer-Encoding")
        || headers.get("Connection").is_some_and(|connection| connection.starts_with_ignore_ascii_case("close"))
        || headers.contains("Content-Type")
}

/// Copies the body announced by `headers` from `input` into `out`, then shuts
/// `out` down. Returns the number of body bytes copied.
///
/// # Errors
///
/// See [`BodyFraming::of`] and [`BodyFraming::copy`].
pub async fn parse_http_body<R, W>(headers: &HttpHeaders<'_>, input: &mut R, out: &mut W) -> Result<u64, ParseError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let copied = BodyFraming::of(headers)?.copy(input, out).await?;
    out.shutdown().await?;
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::parse_request;
    use crate::pools::{HttpPools, PoolConfig};

    async fn request(head: &str) -> Request {
        let pools = HttpPools::new(&PoolConfig::default()).unwrap();
        let mut input = head.as_bytes();
        parse_request(&mut input, &pools).await.unwrap().unwrap()
    }

    async fn framing(head: &str) -> Result<BodyFraming, ParseError> {
        let request = request(head).await;
        BodyFraming::of(&request.headers())
    }

    #[tokio::test]
    async fn framing_precedence() {
        let head = "POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\nContent-Length: 5\r\n\r\n";
        assert_eq!(framing(head).await.unwrap(), BodyFraming::Length(5));

        let head = "POST / HTTP/1.1\r\nContent-Type: text/plain\r\nTransfer-Encoding: Chunked\r\n\r\n";
        assert_eq!(framing(head).await.unwrap(), BodyFraming::Chunked);

        let head = "POST / HTTP/1.1\r\nConnection: close\r\n\r\n";
        assert_eq!(framing(head).await.unwrap(), BodyFraming::UntilClose);

        let head = "POST / HTTP/1.1\r\nContent-Type: text/plain\r\n\r\n";
        assert_eq!(framing(head).await.unwrap(), BodyFraming::UntilClose);

        let head = "POST /u HTTP/1.1\r\nConnection: close\r\nContent-Type: multipart/form-data; boundary=x\r\n\r\n";
        assert_eq!(framing(head).await.unwrap(), BodyFraming::UntilClose);

        let head = "POST / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n";
        assert_eq!(framing(head).await.unwrap(), BodyFraming::None);
    }

    #[tokio::test]
    async fn rejected_framings() {
        let head = "POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n";
        assert!(matches!(framing(head).await, Err(ParseError::NotSupported { .. })));

        let head = "POST / HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=x\r\n\r\n";
        assert!(matches!(framing(head).await, Err(ParseError::NotSupported { .. })));

        let head = "POST / HTTP/1.1\r\nContent-Length: 12a\r\n\r\n";
        assert!(matches!(framing(head).await, Err(ParseError::InvalidContentLength { .. })));

        let head = "POST / HTTP/1.1\r\nContent-Type: multipart/form-data\r\nContent-Length: 3\r\n\r\n";
        assert_eq!(framing(head).await.unwrap(), BodyFraming::Length(3));
    }

    #[tokio::test]
    async fn expect_body() {
        assert!(!expect_http_body(&request("GET / HTTP/1.1\r\nContent-Length: 10\r\n\r\n").await));
        assert!(!expect_http_body(&request("HEAD / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n").await));
        assert!(!expect_http_body(&request("OPTIONS * HTTP/1.1\r\nContent-Type: text/plain\r\n\r\n").await));
        assert!(!expect_http_body(&request("POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n").await));
        assert!(!expect_http_body(&request("POST / HTTP/1.1\r\nHost: a\r\n\r\n").await));

        assert!(expect_http_body(&request("POST / HTTP/1.1\r\nContent-Length: 1\r\n\r\n").await));
        assert!(expect_http_body(&request("PUT / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n").await));
        assert!(expect_http_body(&request("DELETE / HTTP/1.1\r\nConnection: close\r\n\r\n").await));
        assert!(expect_http_body(&request("PATCH / HTTP/1.1\r\nContent-Type: text/plain\r\n\r\n").await));
    }

    #[tokio::test]
    async fn copy_bodies() {
        let head = request("POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\n").await;
        let mut input: &[u8] = b"helloGET";
        let mut out = Vec::new();
        assert_eq!(parse_http_body(&head.headers(), &mut input, &mut out).await.unwrap(), 5);
        assert_eq!(out, b"hello");
        assert_eq!(input, b"GET");

        let head = request("POST / HTTP/1.1\r\nConnection: close\r\n\r\n").await;
        let mut input: &[u8] = b"until the end";
        let mut out = Vec::new();
        parse_http_body(&head.headers(), &mut input, &mut out).await.unwrap();
        assert_eq!(out, b"until the end");

        let mut input: &[u8] = b"\r\nWiki\r\n0\r\n\r\n";
        let mut out = Vec::new();
        let err = BodyFraming::Chunked.copy(&mut input, &mut out).await.unwrap_err();
        assert!(matches!(err, ParseError::InvalidChunk { .. }));
        assert!(out.is_empty());

        let head = request("POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n").await;
        let mut input: &[u8] = b"short";
        let mut out = Vec::new();
        let err = parse_http_body(&head.headers(), &mut input, &mut out).await.unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
    }
}
