use std::str;

use bytes::BytesMut;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::buffer::CharBufferBuilder;
use crate::ensure;
use crate::protocol::ParseError;

/// Reads one line from `input` and appends its characters to `builder`.
///
/// Both `\r\n` and `\n` terminate a line; the terminator is not appended.
/// When the whole line is already buffered it is decoded in place, otherwise
/// its bytes are gathered in `scratch` first.
///
/// Returns `Ok(false)` if the input ended before the first byte of the line.
///
/// # Errors
///
/// - [`ParseError::TooLongLine`] if the line holds more than `limit` bytes
/// - [`ParseError::InvalidUtf8`] if the line isn't valid UTF-8
/// - [`ParseError::UnexpectedEof`] if the input ends inside the line
pub(crate) async fn read_utf8_line_to<R>(
    input: &mut R,
    builder: &mut CharBufferBuilder,
    limit: usize,
    scratch: &mut BytesMut,
) -> Result<bool, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    scratch.clear();

    loop {
        let available = input.fill_buf().await?;
        if available.is_empty() {
            ensure!(scratch.is_empty(), ParseError::unexpected_eof("reading a line"));
            return Ok(false);
        }

        if let Some(pos) = available.iter().position(|&b| b == b'\n') {
            if scratch.is_empty() {
                append_line(builder, &available[..pos], limit)?;
            } else {
                ensure!(scratch.len() + pos <= limit + 1, ParseError::too_long_line(limit));
                scratch.extend_from_slice(&available[..pos]);
                append_line(builder, scratch, limit)?;
            }
            input.consume(pos + 1);
            return Ok(true);
        }

        let len = available.len();
        ensure!(scratch.len() + len <= limit + 1, ParseError::too_long_line(limit));
        scratch.extend_from_slice(available);
        input.consume(len);
    }
}

fn append_line(builder: &mut CharBufferBuilder, line: &[u8], limit: usize) -> Result<(), ParseError> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    ensure!(line.len() <= limit, ParseError::too_long_line(limit));
    builder.append_str(str::from_utf8(line)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::{HttpPools, PoolConfig};
    use tokio::io::BufReader;

    #[tokio::test]
    async fn crlf_and_lf_lines() {
        let pools = HttpPools::new(&PoolConfig::default()).unwrap();
        let mut input: &[u8] = b"GET / HTTP/1.1\r\nHost: a\n\r\n";
        let mut builder = pools.char_buffer();
        let mut scratch = BytesMut::new();

        assert!(read_utf8_line_to(&mut input, &mut builder, 100, &mut scratch).await.unwrap());
        assert_eq!(builder.as_str(), "GET / HTTP/1.1");
        assert!(read_utf8_line_to(&mut input, &mut builder, 100, &mut scratch).await.unwrap());
        assert_eq!(builder.as_str(), "GET / HTTP/1.1Host: a");
        assert!(read_utf8_line_to(&mut input, &mut builder, 100, &mut scratch).await.unwrap());
        assert_eq!(builder.len(), 21);
        assert!(!read_utf8_line_to(&mut input, &mut builder, 100, &mut scratch).await.unwrap());
    }

    #[tokio::test]
    async fn line_split_across_reads() {
        let pools = HttpPools::new(&PoolConfig::default()).unwrap();
        let text = "Content-Type: text/plain; charset=\u{e9}t\u{e9}\r\n";
        let mut input = BufReader::with_capacity(3, text.as_bytes());
        let mut builder = pools.char_buffer();
        let mut scratch = BytesMut::new();

        assert!(read_utf8_line_to(&mut input, &mut builder, 100, &mut scratch).await.unwrap());
        assert_eq!(builder.as_str(), text.trim_end());
    }

    #[tokio::test]
    async fn limits_and_truncation() {
        let pools = HttpPools::new(&PoolConfig::default()).unwrap();
        let mut builder = pools.char_buffer();
        let mut scratch = BytesMut::new();

        let mut input: &[u8] = b"abcdef\r\n";
        assert!(read_utf8_line_to(&mut input, &mut builder, 6, &mut scratch).await.unwrap());

        let mut input = BufReader::with_capacity(2, &b"abcdefg\r\n"[..]);
        let err = read_utf8_line_to(&mut input, &mut builder, 6, &mut scratch).await.unwrap_err();
        assert!(matches!(err, ParseError::TooLongLine { limit: 6 }));

        let mut input: &[u8] = b"abc";
        let err = read_utf8_line_to(&mut input, &mut builder, 6, &mut scratch).await.unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));

        let mut input: &[u8] = b"\xff\xfe\n";
        let err = read_utf8_line_to(&mut input, &mut builder, 6, &mut scratch).await.unwrap_err();
        assert!(matches!(err, ParseError::InvalidUtf8 { .. }));
    }
}
