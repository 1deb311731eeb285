//! HTTP server and graceful shutdown.
//!
//! # Lifecycle
//!
//! ```text
//! starting ──bind ok──▶ serving ──shutdown triggered──▶ draining ──▶ stopped
//!    │                     │                               │
//!    └─bind error──────────┼──────────────▶ stopped        └─drain timeout: force-close
//!                          └─fatal accept error: trigger shutdown, drain, report
//! ```
//!
//! While draining the server:
//! 1. Stops calling `listener.accept()` and closes the listening socket.
//! 2. Tells every open connection to finish its in-flight request and close
//!    instead of waiting for another keep-alive request.
//! 3. Waits up to the drain timeout, then aborts whatever is left.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Timeouts;
use crate::error::Error;
use crate::idle::IdleTimeout;
use crate::lifecycle::{Shutdown, ShutdownCause};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// A bound HTTP server, not yet serving.
pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
    timeouts: Timeouts,
}

impl Server {
    /// Binds `addr`. Port 0 picks a free port; see
    /// [`local_addr`](Server::local_addr).
    pub async fn bind(addr: SocketAddr) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        let addr = listener.local_addr().map_err(Error::LocalAddr)?;
        Ok(Self { listener, addr, timeouts: Timeouts::default() })
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accepts connections and dispatches them through `router` until
    /// `shutdown` is triggered, then drains.
    ///
    /// Returns `Err` if the listener died or the drain ran out of time.
    pub async fn serve<S>(self, router: Router<S>, shutdown: Shutdown) -> Result<(), Error>
    where
        S: Send + Sync + 'static,
    {
        let Self { listener, addr, timeouts } = self;
        let router = Arc::new(router);

        let mut builder = ConnBuilder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(timeouts.read);
        let builder = Arc::new(builder);

        info!(addr = %addr, "airclip listening");

        let mut tasks = JoinSet::new();
        let mut fatal = None;

        loop {
            tokio::select! {
                // Shutdown first, so a trigger stops accepting even if more
                // connections are queued.
                biased;

                cause = shutdown.triggered() => {
                    info!(%cause, in_flight = tasks.len(), "Context done: {cause}");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) if is_connection_error(&e) => {
                            debug!("accept error: {e}");
                            continue;
                        }
                        Err(e) if is_fd_exhaustion(&e) => {
                            warn!("accept error: {e}, retrying in 1s");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            continue;
                        }
                        Err(e) => {
                            error!("HTTP server failed: {e}");
                            shutdown.trigger(ShutdownCause::ServerError);
                            fatal = Some(e);
                            break;
                        }
                    };

                    tasks.spawn(serve_connection(
                        Arc::clone(&builder),
                        Arc::clone(&router),
                        stream,
                        remote_addr,
                        timeouts,
                        shutdown.clone(),
                    ));
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);
        info!(in_flight = tasks.len(), "Shutting down server gracefully...");
        let drained = drain(&mut tasks, timeouts.drain).await;

        match fatal {
            Some(e) => Err(Error::Accept(e)),
            None => drained,
        }
    }
}

// ── Connections ───────────────────────────────────────────────────────────────

async fn serve_connection<S>(
    builder: Arc<ConnBuilder<TokioExecutor>>,
    router: Arc<Router<S>>,
    stream: TcpStream,
    remote_addr: SocketAddr,
    timeouts: Timeouts,
    shutdown: Shutdown,
) where
    S: Send + Sync + 'static,
{
    let io = TokioIo::new(IdleTimeout::new(stream, timeouts.idle));

    // Called once per request on the connection, not once per connection.
    let svc = service_fn(move |req| {
        let router = Arc::clone(&router);
        async move { dispatch(router, req, remote_addr, timeouts.write).await }
    });

    let conn = builder.serve_connection(io, svc);
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            res = conn.as_mut() => {
                if let Err(e) = res {
                    debug!(peer = %remote_addr, "connection error: {e}");
                }
                break;
            }
            _ = shutdown.triggered(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

/// Waits for every connection task, up to `timeout`. Past that the rest
/// are aborted and the drain is reported as failed.
async fn drain(tasks: &mut JoinSet<()>, timeout: Duration) -> Result<(), Error> {
    let all_done = async {
        while tasks.join_next().await.is_some() {}
    };
    if tokio::time::timeout(timeout, all_done).await.is_ok() {
        return Ok(());
    }

    let in_flight = tasks.len();
    error!(in_flight, ?timeout, "drain timed out, closing remaining connections");
    tasks.shutdown().await;
    Err(Error::DrainTimeout { in_flight, timeout })
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
    )
}

// The process or system is out of descriptors. Usually clears once some
// connections close.
#[cfg(unix)]
fn is_fd_exhaustion(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(libc::EMFILE | libc::ENFILE))
}

#[cfg(not(unix))]
fn is_fd_exhaustion(_e: &io::Error) -> bool {
    false
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request and produces one response.
///
/// Handler failures are already responses. The only error is a handler
/// that outlives the write timeout; hyper then drops the connection without
/// answering.
async fn dispatch<S>(
    router: Arc<Router<S>>,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
    write_timeout: Duration,
) -> Result<http::Response<Full<Bytes>>, Error>
where
    S: Send + Sync + 'static,
{
    let Some(handler) = router.lookup(req.uri().path()) else {
        return Ok(Response::error(StatusCode::NOT_FOUND, "404 page not found").into_inner());
    };

    let path = req.uri().path().to_owned();
    let req = Request::from_hyper(req, remote_addr);
    let call = handler.call(req, Arc::clone(router.state()));

    match tokio::time::timeout(write_timeout, call).await {
        Ok(response) => Ok(response.into_inner()),
        Err(_) => {
            warn!(peer = %remote_addr, path, "response not ready in time, dropping connection");
            Err(Error::ResponseTimeout(write_timeout))
        }
    }
}
