//! Incoming HTTP request type.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};

use crate::error::Error;

pub(crate) type Body = BoxBody<Bytes, hyper::Error>;

/// An incoming HTTP request.
///
/// Headers and the peer address are available immediately. The body stays
/// on the wire until [`read_body`](Request::read_body) is called, so a
/// handler can reject a request without reading it.
pub struct Request {
    method: Method,
    headers: HeaderMap,
    remote_addr: SocketAddr,
    body: Option<Body>,
}

impl Request {
    pub(crate) fn from_hyper(
        req: hyper::Request<hyper::body::Incoming>,
        remote_addr: SocketAddr,
    ) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            headers: parts.headers,
            remote_addr,
            body: Some(body.boxed()),
        }
    }

    /// Builds a request with an in-memory body. Used by handler tests that
    /// have no socket behind them.
    pub fn from_parts(
        method: Method,
        headers: HeaderMap,
        remote_addr: SocketAddr,
        body: impl Into<Bytes>,
    ) -> Self {
        let body = Full::new(body.into())
            .map_err(|never| match never {})
            .boxed();
        Self {
            method,
            headers,
            remote_addr,
            body: Some(body),
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn remote_addr(&self) -> SocketAddr { self.remote_addr }

    /// Reads the whole body, giving up after `timeout`.
    ///
    /// The body can be read once. A second call returns an empty buffer.
    pub async fn read_body(&mut self, timeout: Duration) -> Result<Bytes, Error> {
        let Some(body) = self.body.take() else {
            return Ok(Bytes::new());
        };
        match tokio::time::timeout(timeout, body.collect()).await {
            Ok(Ok(collected)) => Ok(collected.to_bytes()),
            Ok(Err(e)) => Err(Error::Body(e)),
            Err(_) => Err(Error::BodyTimeout(timeout)),
        }
    }
}
