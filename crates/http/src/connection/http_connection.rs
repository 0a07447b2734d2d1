use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::mpsc;
use tracing::{error, info, trace, warn};

use crate::codec::{BodyFraming, expect_http_body, parse_request};
use crate::connection::body::DiscardOnClose;
use crate::connection::{PipelineConfig, RequestBody};
use crate::handler::Handler;
use crate::pools::HttpPools;
use crate::protocol::{HttpError, HttpResponse, ParseError, Request, SendError};

/// Sent when a response can't be encoded at all.
const INTERNAL_ERROR: &[u8] = b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n";

/// An HTTP/1.1 connection processing pipelined requests.
///
/// One reader parses requests in sequence. Each request gets its own response
/// pipe, queued in arrival order, and its handler runs on a spawned task, so
/// the reader moves on to the next request right after streaming the body.
/// One writer drains the queue in order: a response is written only after
/// every earlier one, whatever order the handlers finish in.
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
#[derive(Debug)]
pub struct HttpConnection<R, W> {
    reader: BufReader<R>,
    writer: W,
    pools: HttpPools,
    config: PipelineConfig,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, pools: HttpPools) -> Self {
        Self::with_config(reader, writer, pools, PipelineConfig::default())
    }

    pub fn with_config(reader: R, writer: W, pools: HttpPools, config: PipelineConfig) -> Self {
        Self { reader: BufReader::with_capacity(config.read_buffer_size, reader), writer, pools, config }
    }

    /// Serves requests until the peer closes its side or a request can't be
    /// parsed. Responses already queued are flushed before the write side is
    /// shut down.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::RequestError`] if a request is malformed or the
    /// read side fails, [`HttpError::ResponseError`] if writing fails.
    pub async fn process<H>(self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler + ?Sized + 'static,
    {
        let Self { mut reader, mut writer, pools, config } = self;
        let (queue, outputs) = mpsc::channel(config.max_in_flight.max(1));

        let reading = read_requests(&mut reader, queue, &pools, config, handler);
        let writing = write_responses(&mut writer, outputs);
        tokio::pin!(reading, writing);

        tokio::select! {
            read_result = &mut reading => {
                let write_result = writing.await;
                read_result?;
                write_result?;
            }
            write_result = &mut writing => {
                // the writer only ends on its own when it failed or the reader is done
                write_result?;
                reading.await?;
            }
        }

        info!("connection finished");
        Ok(())
    }
}

async fn read_requests<R, H>(
    reader: &mut R,
    queue: mpsc::Sender<DuplexStream>,
    pools: &HttpPools,
    config: PipelineConfig,
    handler: Arc<H>,
) -> Result<(), HttpError>
where
    R: AsyncBufRead + Unpin,
    H: Handler + ?Sized + 'static,
{
    loop {
        let request = match parse_request(reader, pools).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                info!("can't read more request, break this connection down");
                return Ok(());
            }
            Err(e) => return Err(reject(&queue, config, e).await),
        };

        let framing = if expect_http_body(&request) {
            match BodyFraming::of(&request.headers()) {
                Ok(framing) => framing,
                Err(e) => return Err(reject(&queue, config, e).await),
            }
        } else {
            BodyFraming::None
        };

        let (sink, source) = tokio::io::duplex(config.pipe_capacity);
        if queue.send(source).await.is_err() {
            warn!("response writer stopped, dropping request");
            return Ok(());
        }

        let (body, body_writer) = if framing.is_none() {
            (RequestBody::empty(), None)
        } else {
            let (body_writer, body_reader) = tokio::io::duplex(config.pipe_capacity);
            (RequestBody::new(body_reader), Some(body_writer))
        };

        tokio::spawn(respond(Arc::clone(&handler), request, body, sink));

        if let Some(body_writer) = body_writer {
            let mut out = DiscardOnClose::new(body_writer);
            if let Err(e) = framing.copy(reader, &mut out).await {
                error!(cause = %e, "can't read request body");
                return Err(e.into());
            }
            out.shutdown().await.map_err(ParseError::io)?;
        }
    }
}

/// Queues an error response for a request that can't be served and hands
/// the error back. Transport failures get no response.
async fn reject(queue: &mpsc::Sender<DuplexStream>, config: PipelineConfig, e: ParseError) -> HttpError {
    error!(cause = %e, "can't receive next request");
    if e.is_io() {
        return e.into();
    }

    let status = if matches!(e, ParseError::NotSupported { .. }) { 501 } else { 400 };
    let (mut sink, source) = tokio::io::duplex(config.pipe_capacity);
    if queue.send(source).await.is_ok() {
        write_response(&mut sink, &HttpResponse::new(status)).await;
    }
    e.into()
}

async fn respond<H>(handler: Arc<H>, request: Request, body: RequestBody, mut sink: DuplexStream)
where
    H: Handler + ?Sized + 'static,
{
    let outcome = tokio::spawn(async move { handler.call(request, body).await }).await;
    let response = match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            error!(cause = %e, "handle response error");
            HttpResponse::new(500)
        }
        Err(e) => {
            error!(cause = %e, "request handler panicked or was cancelled");
            HttpResponse::new(500)
        }
    };

    write_response(&mut sink, &response).await;
}

async fn write_response(sink: &mut DuplexStream, response: &HttpResponse) {
    let mut buf = BytesMut::new();
    let bytes: &[u8] = match response.encode(&mut buf) {
        Ok(()) => &buf,
        Err(e) => {
            error!(cause = %e, "can't encode response");
            INTERNAL_ERROR
        }
    };

    if let Err(e) = sink.write_all(bytes).await {
        trace!(cause = %e, "connection closed before the response was written");
        return;
    }
    if let Err(e) = sink.shutdown().await {
        trace!(cause = %e, "connection closed before the response was finished");
    }
}

async fn write_responses<W>(writer: &mut W, mut outputs: mpsc::Receiver<DuplexStream>) -> Result<(), SendError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut source) = outputs.recv().await {
        tokio::io::copy(&mut source, writer).await.map_err(SendError::io)?;
        writer.flush().await.map_err(SendError::io)?;
    }

    writer.shutdown().await.map_err(SendError::io)
}
