//! Decoder for the chunked transfer coding.
//!
//! Each chunk is a hexadecimal size line (optionally followed by extensions),
//! the data and a CRLF. A zero sized chunk ends the body; trailer fields
//! after it are read and ignored. See
//! [RFC 7230 Section 4.1](https://tools.ietf.org/html/rfc7230#section-4.1).

use std::task::Poll;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::protocol::ParseError;
use ChunkedState::{Body, BodyCr, BodyLf, End, EndCr, EndLf, Extension, Size, SizeLf, SizeLws, SizeStart, Trailer, TrailerLf};

/// A byte-at-a-time decoder for chunked bodies.
///
/// The decoder keeps its state between calls, so input may be fed in
/// arbitrary pieces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u64,
}

/// What one call to [`ChunkedDecoder::decode`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkedItem<'a> {
    /// Body bytes, borrowed from the input.
    Chunk(&'a [u8]),
    /// The terminating chunk and the trailers have been read.
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the first hex digit of the chunk size
    SizeStart,
    /// Read the rest of the chunk size in hex
    Size,
    /// Handle whitespace after size
    SizeLws,
    /// Skip chunk extensions
    Extension,
    /// Read LF after chunk size
    SizeLf,
    /// Read chunk data
    Body,
    /// Read CR after chunk data
    BodyCr,
    /// Read LF after chunk data
    BodyLf,
    /// Read optional trailer fields
    Trailer,
    /// Read LF after trailer
    TrailerLf,
    /// Read final CR
    EndCr,
    /// Read final LF
    EndLf,
    /// Final state after reading last chunk
    End,
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: SizeStart, remaining_size: 0 }
    }

    pub fn is_finished(&self) -> bool {
        self.state == End
    }

    /// Advances through `src`, consuming what it decodes.
    ///
    /// # Returns
    /// - `Ok(Some(ChunkedItem::Chunk(bytes)))` when body bytes are available
    /// - `Ok(Some(ChunkedItem::Eof))` when the final chunk has been processed
    /// - `Ok(None)` when `src` is exhausted and more input is needed
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidChunk`] if the encoding is malformed.
    pub fn decode<'a>(&mut self, src: &mut &'a [u8]) -> Result<Option<ChunkedItem<'a>>, ParseError> {
        loop {
            if self.state == End {
                trace!("finished reading chunked data");
                return Ok(Some(ChunkedItem::Eof));
            }

            if src.is_empty() {
                return Ok(None);
            }

            let mut buf = None;

            self.state = match self.state.step(src, &mut self.remaining_size, &mut buf) {
                Poll::Pending => return Ok(None),
                Poll::Ready(Ok(new_state)) => new_state,
                Poll::Ready(Err(e)) => return Err(e),
            };

            if let Some(bytes) = buf {
                trace!(len = bytes.len(), "read chunked bytes");
                return Ok(Some(ChunkedItem::Chunk(bytes)));
            }
        }
    }

    /// Decodes a whole chunked body from `input` into `out`, returning the
    /// number of body bytes written. Bytes after the body stay in `input`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::UnexpectedEof`] if `input` ends before the final
    /// chunk, [`ParseError::InvalidChunk`] on malformed input and
    /// [`ParseError::Io`] if reading or writing fails.
    pub async fn decode_to<R, W>(&mut self, input: &mut R, out: &mut W) -> Result<u64, ParseError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut written = 0u64;

        loop {
            let available = input.fill_buf().await?;
            if available.is_empty() && !self.is_finished() {
                return Err(ParseError::unexpected_eof("reading a chunked body"));
            }

            let mut src = available;
            let item = self.decode(&mut src)?;
            let consumed = available.len() - src.len();

            match item {
                Some(ChunkedItem::Chunk(bytes)) => {
                    out.write_all(bytes).await?;
                    written += bytes.len() as u64;
                }
                Some(ChunkedItem::Eof) => {
                    input.consume(consumed);
                    return Ok(written);
                }
                None => {}
            }

            input.consume(consumed);
        }
    }
}

macro_rules! try_next_byte {
    ($src:ident) => {{
        let bytes: &[u8] = *$src;
        match bytes.split_first() {
            Some((&b, rest)) => {
                *$src = rest;
                b
            }
            None => return Poll::Pending,
        }
    }};
}

impl ChunkedState {
    fn step<'a>(self, src: &mut &'a [u8], remaining_size: &mut u64, buf: &mut Option<&'a [u8]>) -> Poll<Result<ChunkedState, ParseError>> {
        match self {
            SizeStart => ChunkedState::read_size_start(src, remaining_size),
            Size => ChunkedState::read_size(src, remaining_size),
            SizeLws => ChunkedState::read_size_lws(src),
            Extension => ChunkedState::read_extension(src),
            SizeLf => ChunkedState::read_size_lf(src, *remaining_size),
            Body => ChunkedState::read_body(src, remaining_size, buf),
            BodyCr => ChunkedState::read_body_cr(src),
            BodyLf => ChunkedState::read_body_lf(src),
            Trailer => ChunkedState::read_trailer(src),
            TrailerLf => ChunkedState::read_trailer_lf(src),
            EndCr => ChunkedState::read_end_cr(src),
            EndLf => ChunkedState::read_end_lf(src),
            End => Poll::Ready(Ok(End)),
        }
    }

    /// A size line must start with a hex digit.
    fn read_size_start(src: &mut &[u8], size_per_chunk: &mut u64) -> Poll<Result<ChunkedState, ParseError>> {
        let b = try_next_byte!(src);
        match hex_digit(b) {
            Some(digit) => {
                *size_per_chunk = u64::from(digit);
                Poll::Ready(Ok(Size))
            }
            None => Poll::Ready(Err(ParseError::invalid_chunk(format!("chunk size starts with {b:#04x} instead of a hex digit")))),
        }
    }

    /// Hex digits accumulate into the size; whitespace, `;` or CR end it.
    fn read_size(src: &mut &[u8], size_per_chunk: &mut u64) -> Poll<Result<ChunkedState, ParseError>> {
        let digit = match try_next_byte!(src) {
            b'\t' | b' ' => return Poll::Ready(Ok(SizeLws)),
            b';' => return Poll::Ready(Ok(Extension)),
            b'\r' => return Poll::Ready(Ok(SizeLf)),
            b => match hex_digit(b) {
                Some(digit) => digit,
                None => return Poll::Ready(Err(ParseError::invalid_chunk(format!("invalid byte {b:#04x} in chunk size")))),
            },
        };

        match size_per_chunk.checked_mul(16).and_then(|size| size.checked_add(u64::from(digit))) {
            Some(size) => *size_per_chunk = size,
            None => return Poll::Ready(Err(ParseError::invalid_chunk("chunk size overflows"))),
        }

        Poll::Ready(Ok(Size))
    }

    fn read_size_lws(src: &mut &[u8]) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            // LWS can follow the chunk size, but no more digits can come
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk size linear white space"))),
        }
    }

    fn read_extension(src: &mut &[u8]) -> Poll<Result<ChunkedState, ParseError>> {
        // extensions are ignored up to the CR, a bare LF is rejected
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(SizeLf)),
            b'\n' => Poll::Ready(Err(ParseError::invalid_chunk("chunk extension contains a bare LF"))),
            _ => Poll::Ready(Ok(Extension)),
        }
    }

    fn read_size_lf(src: &mut &[u8], size_per_chunk: u64) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' if size_per_chunk == 0 => Poll::Ready(Ok(EndCr)),
            b'\n' => Poll::Ready(Ok(Body)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("missing LF after chunk size"))),
        }
    }

    fn read_body<'a>(src: &mut &'a [u8], size_per_chunk: &mut u64, buf: &mut Option<&'a [u8]>) -> Poll<Result<ChunkedState, ParseError>> {
        if src.is_empty() {
            return Poll::Ready(Ok(Body));
        }

        if *size_per_chunk == 0 {
            return Poll::Ready(Ok(BodyCr));
        }

        let read_size = usize::try_from(*size_per_chunk).map_or(src.len(), |remaining| remaining.min(src.len()));
        let bytes: &'a [u8] = *src;
        let (chunk, rest) = bytes.split_at(read_size);
        *src = rest;
        *size_per_chunk -= read_size as u64;
        *buf = Some(chunk);

        if *size_per_chunk > 0 { Poll::Ready(Ok(Body)) } else { Poll::Ready(Ok(BodyCr)) }
    }

    fn read_body_cr(src: &mut &[u8]) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(BodyLf)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("missing CR after chunk data"))),
        }
    }

    fn read_body_lf(src: &mut &[u8]) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(SizeStart)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("missing LF after chunk data"))),
        }
    }

    fn read_trailer(src: &mut &[u8]) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(TrailerLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_trailer_lf(src: &mut &[u8]) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(EndCr)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("missing LF after trailer field"))),
        }
    }

    /// Anything but CR starts a trailer field.
    fn read_end_cr(src: &mut &[u8]) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(EndLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_end_lf(src: &mut &[u8]) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(End)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("missing final LF"))),
        }
    }
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        let mut buffer: &[u8] = b"10\r\n1234567890abcdef\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(item, ChunkedItem::Chunk(b"1234567890abcdef"));

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(item, ChunkedItem::Eof);
        assert!(decoder.is_finished());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_chunks() {
        let mut buffer: &[u8] = b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(ChunkedItem::Chunk(b"hello")));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(ChunkedItem::Chunk(b", world")));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(ChunkedItem::Eof));
    }

    #[test]
    fn test_chunks_with_extensions() {
        let mut buffer: &[u8] = b"5;chunk-ext=value\r\nhello\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(ChunkedItem::Chunk(b"hello")));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(ChunkedItem::Eof));
    }

    #[test]
    fn test_chunks_with_trailers() {
        let mut buffer: &[u8] = b"5\r\nhello\r\n0\r\nTrailer: value\r\n\r\nGET";
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(ChunkedItem::Chunk(b"hello")));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(ChunkedItem::Eof));
        assert_eq!(buffer, b"GET");
    }

    #[test]
    fn test_incomplete_chunk() {
        let mut buffer: &[u8] = b"5\r\nhel";
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(ChunkedItem::Chunk(b"hel")));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), None);

        let mut buffer: &[u8] = b"lo\r\n0\r\n\r\n";
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(ChunkedItem::Chunk(b"lo")));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(ChunkedItem::Eof));
    }

    #[test]
    fn test_split_size_line() {
        let mut decoder = ChunkedDecoder::new();
        for piece in [&b"1"[..], b"a\r", b"\n"] {
            let mut buffer = piece;
            assert_eq!(decoder.decode(&mut buffer).unwrap(), None);
        }

        let data = [b'x'; 26];
        let mut buffer = &data[..];
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(ChunkedItem::Chunk(&data[..])));
    }

    #[test]
    fn test_invalid_chunk_size() {
        let mut buffer: &[u8] = b"xyz\r\n";
        let mut decoder = ChunkedDecoder::new();

        assert!(matches!(decoder.decode(&mut buffer), Err(ParseError::InvalidChunk { .. })));
    }

    #[test]
    fn test_size_without_digits() {
        for line in [&b"\r\nWiki\r\n0\r\n\r\n"[..], b";ext\r\n", b" 4\r\n"] {
            let mut buffer = line;
            let mut decoder = ChunkedDecoder::new();
            assert!(matches!(decoder.decode(&mut buffer), Err(ParseError::InvalidChunk { .. })));
        }

        let mut buffer: &[u8] = b"2\r\nhi\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(ChunkedItem::Chunk(b"hi")));
        assert!(matches!(decoder.decode(&mut buffer), Err(ParseError::InvalidChunk { .. })));
    }

    #[test]
    fn test_size_overflow() {
        let mut buffer: &[u8] = b"1ffffffffffffffff\r\n";
        let mut decoder = ChunkedDecoder::new();

        assert!(matches!(decoder.decode(&mut buffer), Err(ParseError::InvalidChunk { .. })));
    }

    #[test]
    fn test_missing_crlf() {
        let mut buffer: &[u8] = b"5\r\nhelloBad";
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(ChunkedItem::Chunk(b"hello")));
        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn test_large_chunk() {
        let size = 1024 * 1024;
        let mut data = format!("{size:x}\r\n").into_bytes();
        data.extend(vec![b'A'; size]);
        data.extend(b"\r\n0\r\n\r\n");

        let mut buffer = &data[..];
        let mut decoder = ChunkedDecoder::new();

        let Some(ChunkedItem::Chunk(chunk)) = decoder.decode(&mut buffer).unwrap() else {
            panic!("expected a chunk");
        };
        assert_eq!(chunk.len(), size);
        assert!(chunk.iter().all(|&b| b == b'A'));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(ChunkedItem::Eof));
    }

    #[test]
    fn test_zero_size_chunk() {
        let mut buffer: &[u8] = b"0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(ChunkedItem::Eof));
    }

    #[tokio::test]
    async fn test_decode_to_writer() {
        let mut input = tokio::io::BufReader::with_capacity(4, &b"4\r\nWiki\r\n0\r\n\r\nnext"[..]);
        let mut out = Vec::new();

        let written = ChunkedDecoder::new().decode_to(&mut input, &mut out).await.unwrap();
        assert_eq!(written, 4);
        assert_eq!(out, b"Wiki");

        let mut rest = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut input, &mut rest).await.unwrap();
        assert_eq!(rest, "next");
    }

    #[tokio::test]
    async fn test_decode_to_truncated() {
        let mut input: &[u8] = b"4\r\nWi";
        let mut out = Vec::new();

        let err = ChunkedDecoder::new().decode_to(&mut input, &mut out).await.unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
        assert_eq!(out, b"Wi");
    }
}
