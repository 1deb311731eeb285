//! # airclip
//!
//! Send text from a phone to a desktop over the local network. A `POST
//! /notify` with a text body lands on the desktop clipboard and raises a
//! notification.
//!
//! ## The contract
//!
//! - **Local network only.** Loopback, RFC 1918 and link-local sources are
//!   admitted; everything else gets `403`. The first `X-Forwarded-For`
//!   entry is trusted as the source when present, which is a convenience
//!   for local proxies and not a security boundary.
//! - **Shared token.** `Authorization: Bearer <token>` must match exactly,
//!   unless the token is configured empty.
//! - **Exact bytes.** The body reaches the clipboard tool on stdin, never
//!   through a shell.
//! - **Bounded shutdown.** The first SIGINT/SIGTERM drains in-flight
//!   requests for up to five seconds; a second one exits immediately with
//!   code 2.
//!
//! ## Embedding
//!
//! ```rust,no_run
//! use airclip::dispatch::{CommandDesktop, Dispatcher, ToolCommand};
//! use airclip::lifecycle::Shutdown;
//! use airclip::middleware::{AccessPolicy, Cors};
//! use airclip::{AppState, Server};
//!
//! # async fn run() -> Result<(), airclip::Error> {
//! let desktop = CommandDesktop::new(
//!     ToolCommand::new("wl-copy", Vec::<String>::new()),
//!     ToolCommand::new("notify-send", ["Copied"]),
//! );
//! let state = AppState::new(
//!     AccessPolicy::new(true, "local-use-only"),
//!     Cors::new(true),
//!     Dispatcher::new(desktop),
//! );
//!
//! let server = Server::bind("127.0.0.1:9123".parse().unwrap()).await?;
//! server.serve(airclip::router(state), Shutdown::new()).await
//! # }
//! ```

mod app;
mod error;
mod handler;
mod idle;
mod request;
mod response;
mod router;
mod server;

pub mod config;
pub mod dispatch;
pub mod health;
pub mod lifecycle;
pub mod logging;
pub mod middleware;
pub mod netinfo;
pub mod notify;

pub use app::{AppState, router};
pub use config::{Config, Timeouts};
pub use error::Error;
pub use handler::Handler;
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
