//! Request handlers.
//!
//! A [`Handler`] turns one request into one response. Handlers of pipelined
//! requests run concurrently; the connection puts their responses back in
//! request order. Use [`make_handler`] to build one from an async function.

use std::error::Error;
use std::future::Future;

use async_trait::async_trait;

use crate::connection::RequestBody;
use crate::protocol::{HttpResponse, Request};

pub type BoxError = Box<dyn Error + Send + Sync>;

#[async_trait]
pub trait Handler: Send + Sync {
    /// Handles `request`. An error is answered with `500 Internal Server Error`.
    async fn call(&self, request: Request, body: RequestBody) -> Result<HttpResponse, BoxError>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut, E> Handler for HandlerFn<F>
where
    F: Fn(Request, RequestBody) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HttpResponse, E>> + Send,
    E: Into<BoxError>,
{
    async fn call(&self, request: Request, body: RequestBody) -> Result<HttpResponse, BoxError> {
        (self.f)(request, body).await.map_err(Into::into)
    }
}

pub fn make_handler<F, Fut, E>(f: F) -> HandlerFn<F>
where
    F: Fn(Request, RequestBody) -> Fut,
    Fut: Future<Output = Result<HttpResponse, E>>,
    E: Into<BoxError>,
{
    HandlerFn { f }
}
