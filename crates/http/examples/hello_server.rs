use std::error::Error;

use cio_http::connection::RequestBody;
use cio_http::handler::make_handler;
use cio_http::protocol::{HttpResponse, Request};
use cio_http::server::HttpServer;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let server = match HttpServer::builder().address(([127, 0, 0, 1], 8080).into()).handler(make_handler(hello_world)).build() {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    info!(address = ?server.local_addr(), "start serving");
    server.run().await;
}

async fn hello_world(request: Request, body: RequestBody) -> Result<HttpResponse, Box<dyn Error + Send + Sync>> {
    let path = request.uri().to_string();
    let method = request.method_name().to_string();
    request.release();

    let body = body.bytes().await?;
    info!(%method, %path, body_len = body.len(), "request received");

    Ok(HttpResponse::ok().header("Content-Type", "text/plain").body("Hello World!\r\n"))
}
