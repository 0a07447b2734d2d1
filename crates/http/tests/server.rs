use std::convert::Infallible;
use std::sync::Arc;

use cio_http::connection::RequestBody;
use cio_http::handler::make_handler;
use cio_http::protocol::{HttpResponse, Request};
use cio_http::server::HttpServer;
use cio_sockets::selector::SelectorManager;
use cio_sockets::socket::{AsyncSocket, SocketOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

async fn echo(request: Request, body: RequestBody) -> Result<HttpResponse, Infallible> {
    let method = request.method_name().to_string();
    let uri = request.uri().to_string();
    request.release();

    let body = body.bytes().await.unwrap_or_default();
    Ok(HttpResponse::ok().body(format!("{method} {uri} {}", body.len())))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn serve_pipelined_requests_over_loopback() {
    let server = HttpServer::builder()
        .address("127.0.0.1:0".parse().unwrap())
        .handler(make_handler(echo))
        .build()
        .unwrap();
    let address = server.local_addr().unwrap();

    let server = Arc::new(server);
    let running = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.run().await }
    });

    let client_selector = SelectorManager::new().unwrap();
    let socket = AsyncSocket::connect(&client_selector.handle(), address, &SocketOptions::default()).await.unwrap();
    let (mut reader, mut writer) = socket.into_split();

    writer.write_all(b"GET /first HTTP/1.1\r\nHost: test\r\n\r\nPOST /second HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello").await.unwrap();
    writer.shutdown().await.unwrap();

    let mut output = String::new();
    reader.read_to_string(&mut output).await.unwrap();

    let first = output.find("GET /first 0").unwrap();
    let second = output.find("POST /second 5").unwrap();
    assert!(first < second, "{output}");
    assert_eq!(output.matches("HTTP/1.1 200 OK\r\n").count(), 2);

    server.close();
    running.await.unwrap();
}
