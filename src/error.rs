//! Unified error type.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// The error type returned by airclip's fallible server operations.
///
/// Client-facing failures (403, 401, 400, 500) are expressed as
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// listener and lifecycle failures: binding a port, a dead listener, or a
/// drain that did not finish in time.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("listener failed: {0}")]
    Accept(#[source] io::Error),

    #[error("could not read local address: {0}")]
    LocalAddr(#[source] io::Error),

    #[error("server shutdown failed: {in_flight} connection(s) still open after {timeout:?}")]
    DrainTimeout { in_flight: usize, timeout: Duration },

    #[error("response not ready within {0:?}")]
    ResponseTimeout(Duration),

    #[error("error reading request body: {0}")]
    Body(#[source] hyper::Error),

    #[error("request body not received within {0:?}")]
    BodyTimeout(Duration),
}
