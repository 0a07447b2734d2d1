//! Start line and header parsing.
//!
//! Each message gets a fresh [`CharBufferBuilder`]: the start line and every
//! header line are appended to it and the parsed fields are ranges over it.
//! Nothing is copied after UTF-8 decoding.
//!
//! On any error the builder and the header table are dropped, which gives
//! their chunks back to the pools before the error propagates.

use std::sync::Arc;

use bytes::BytesMut;
use once_cell::sync::Lazy;
use tokio::io::AsyncBufRead;
use tracing::trace;

use crate::buffer::{CharBufferBuilder, TextRef};
use crate::codec::ascii_tree::AsciiCharTree;
use crate::codec::line::read_utf8_line_to;
use crate::ensure;
use crate::pools::HttpPools;
use crate::protocol::{HeaderEntry, HeaderTable, HttpMethod, ParseError, Request, Response};

/// Limit of the request line and the status line, in bytes.
pub const START_LINE_LIMIT: usize = 8192;

/// Limit of one header line, in bytes.
pub const HEADER_LINE_LIMIT: usize = 4096;

static METHODS: Lazy<AsciiCharTree<(HttpMethod, &'static str)>> = Lazy::new(|| {
    AsciiCharTree::build(HttpMethod::KNOWN.iter().filter_map(|&method| method.known_name().map(|name| (name, (method, name)))))
});

static VERSIONS: Lazy<AsciiCharTree<&'static str>> =
    Lazy::new(|| AsciiCharTree::build(["HTTP/1.0", "HTTP/1.1"].map(|version| (version, version))));

/// Parses the next request head from `input`.
///
/// Returns `Ok(None)` if the input ends cleanly before a new request starts.
/// Empty lines in front of the request line are skipped. The body, if any,
/// is left unread in `input`.
///
/// # Errors
///
/// Returns a [`ParseError`] describing the first malformed element, or
/// [`ParseError::Io`] if reading fails.
pub async fn parse_request<R>(input: &mut R, pools: &HttpPools) -> Result<Option<Request>, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut builder = pools.char_buffer();
    let mut scratch = pools.byte_buffer();

    if !read_start_line(input, &mut builder, &mut scratch).await? {
        return Ok(None);
    }

    let mut line = Cursor::new(0, builder.len());
    let (method, method_text) = parse_method(&builder, &mut line)?;
    let uri = parse_uri(&builder, &mut line)?;
    let version = parse_version(&builder, &mut line)?;
    line.skip_spaces(&builder);
    ensure!(
        line.is_empty(),
        ParseError::invalid_request_line(format!("extra characters after the version: {}", builder.copy_range(line.start, line.end)))
    );

    let headers = parse_headers(input, &mut builder, &mut scratch, pools).await?;

    let request = Request::new(method, method_text, uri, version, headers, builder);
    trace!(?request, "parsed request");
    Ok(Some(request))
}

/// Parses the next response head from `input`.
///
/// Returns `Ok(None)` if the input ends cleanly before a new response starts.
///
/// # Errors
///
/// Returns a [`ParseError`] describing the first malformed element, or
/// [`ParseError::Io`] if reading fails.
pub async fn parse_response<R>(input: &mut R, pools: &HttpPools) -> Result<Option<Response>, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut builder = pools.char_buffer();
    let mut scratch = pools.byte_buffer();

    if !read_start_line(input, &mut builder, &mut scratch).await? {
        return Ok(None);
    }

    let mut line = Cursor::new(0, builder.len());
    let version = parse_version(&builder, &mut line)?;
    let status = parse_status_code(&builder, &mut line)?;
    line.skip_spaces(&builder);
    let status_text = TextRef::Range(line.start, line.end);

    let headers = parse_headers(input, &mut builder, &mut scratch, pools).await?;

    let response = Response::new(version, status, status_text, headers, builder);
    trace!(?response, "parsed response");
    Ok(Some(response))
}

async fn read_start_line<R>(input: &mut R, builder: &mut CharBufferBuilder, scratch: &mut BytesMut) -> Result<bool, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        if !read_utf8_line_to(input, builder, START_LINE_LIMIT, scratch).await? {
            return Ok(false);
        }
        if !builder.is_empty() {
            return Ok(true);
        }
    }
}

async fn parse_headers<R>(
    input: &mut R,
    builder: &mut CharBufferBuilder,
    scratch: &mut BytesMut,
    pools: &HttpPools,
) -> Result<HeaderTable, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut headers = HeaderTable::new(Arc::clone(pools.header_arrays()));

    loop {
        let line_start = builder.len();
        ensure!(
            read_utf8_line_to(input, builder, HEADER_LINE_LIMIT, scratch).await?,
            ParseError::unexpected_eof("reading headers")
        );

        let mut line = Cursor::new(line_start, builder.len());
        line.skip_spaces(builder);
        if line.is_empty() {
            return Ok(headers);
        }

        let name_start = line.start;
        let name_end = line.find_colon_or_space(builder);
        ensure!(name_end > name_start, ParseError::invalid_header(format!("empty header name: {}", line.render(builder))));
        line.start = name_end;

        match line.skip_spaces_and_colon(builder) {
            0 => return Err(ParseError::invalid_header(format!("no colon after header name: {}", line.render_from(name_start, builder)))),
            1 => {}
            _ => return Err(ParseError::multiple_colons(builder.copy_range(name_start, name_end))),
        }

        line.trim_trailing_spaces(builder);
        ensure!(!line.is_empty(), ParseError::missing_header_value(builder.copy_range(name_start, name_end)));

        headers.put(HeaderEntry {
            name_hash: builder.view(name_start, name_end).hash_lower_case(),
            value_hash: builder.view(line.start, line.end).hash_lower_case(),
            name: (name_start, name_end),
            value: (line.start, line.end),
        })?;
    }
}

fn parse_method(builder: &CharBufferBuilder, line: &mut Cursor) -> Result<(HttpMethod, TextRef), ParseError> {
    line.skip_spaces(builder);

    if let Some(((method, name), len)) = METHODS.search(builder.view(line.start, line.end).chars(), |ch| ch == ' ') {
        line.start += len;
        return Ok((method, TextRef::Static(name)));
    }

    let token = line.next_token(builder);
    ensure!(token.0 < token.1, ParseError::invalid_request_line("missing method"));
    Ok((HttpMethod::Custom, TextRef::Range(token.0, token.1)))
}

fn parse_uri(builder: &CharBufferBuilder, line: &mut Cursor) -> Result<TextRef, ParseError> {
    line.skip_spaces(builder);

    let (start, end) = line.next_token(builder);
    ensure!(start < end, ParseError::invalid_request_line("missing request target"));

    if end - start == 1 && builder.char_at(start) == '/' {
        return Ok(TextRef::Static("/"));
    }
    Ok(TextRef::Range(start, end))
}

fn parse_version(builder: &CharBufferBuilder, line: &mut Cursor) -> Result<TextRef, ParseError> {
    line.skip_spaces(builder);

    if let Some((version, len)) = VERSIONS.search(builder.view(line.start, line.end).chars(), |ch| ch == ' ') {
        line.start += len;
        return Ok(TextRef::Static(version));
    }

    let (start, end) = line.next_token(builder);
    ensure!(start < end, ParseError::invalid_request_line("missing protocol version"));
    Ok(TextRef::Range(start, end))
}

fn parse_status_code(builder: &CharBufferBuilder, line: &mut Cursor) -> Result<u16, ParseError> {
    line.skip_spaces(builder);

    let mut status: u16 = 0;
    let mut digits = 0;
    while line.start < line.end {
        let ch = builder.char_at(line.start);
        if ch == ' ' {
            break;
        }

        let Some(digit) = ch.to_digit(10).and_then(|digit| u16::try_from(digit).ok()) else {
            return Err(ParseError::invalid_status_code(format!("illegal character {ch:?} in {}", line.render(builder))));
        };
        // at most three digits, so the value stays below 1000
        ensure!(digits < 3, ParseError::invalid_status_code(format!("too many digits in {}", line.render(builder))));

        status = status * 10 + digit;
        digits += 1;
        line.start += 1;
    }

    ensure!(digits > 0, ParseError::invalid_status_code("missing status code"));
    Ok(status)
}

/// The unparsed rest `[start, end)` of the current line.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    start: usize,
    end: usize,
}

impl Cursor {
    fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    fn skip_spaces(&mut self, builder: &CharBufferBuilder) {
        while self.start < self.end && builder.char_at(self.start) == ' ' {
            self.start += 1;
        }
    }

    fn trim_trailing_spaces(&mut self, builder: &CharBufferBuilder) {
        while self.end > self.start && builder.char_at(self.end - 1) == ' ' {
            self.end -= 1;
        }
    }

    fn find_space_or_end(&self, builder: &CharBufferBuilder) -> usize {
        (self.start..self.end).find(|&index| builder.char_at(index) == ' ').unwrap_or(self.end)
    }

    fn find_colon_or_space(&self, builder: &CharBufferBuilder) -> usize {
        (self.start..self.end).find(|&index| matches!(builder.char_at(index), ' ' | ':')).unwrap_or(self.end)
    }

    /// Skips spaces and colons, returning how many colons were skipped.
    /// Stops counting at two.
    fn skip_spaces_and_colon(&mut self, builder: &CharBufferBuilder) -> usize {
        let mut colons = 0;
        while self.start < self.end {
            match builder.char_at(self.start) {
                ':' => {
                    colons += 1;
                    if colons > 1 {
                        return colons;
                    }
                }
                ' ' => {}
                _ => break,
            }
            self.start += 1;
        }
        colons
    }

    fn next_token(&mut self, builder: &CharBufferBuilder) -> (usize, usize) {
        let start = self.start;
        self.start = self.find_space_or_end(builder);
        (start, self.start)
    }

    fn render(&self, builder: &CharBufferBuilder) -> String {
        builder.copy_range(self.start, self.end)
    }

    fn render_from(&self, start: usize, builder: &CharBufferBuilder) -> String {
        builder.copy_range(start, self.end)
    }
}
