#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use airclip::dispatch::{BoxFuture, Desktop, Dispatcher, ToolError};
use airclip::lifecycle::{Shutdown, ShutdownCause};
use airclip::middleware::{AccessPolicy, Cors};
use airclip::{AppState, Error, Server, Timeouts};
use tokio::task::JoinHandle;

pub const TOKEN: &str = "local-use-only";

/// Records what would have reached the desktop.
#[derive(Default)]
pub struct RecordingDesktop {
    pub clipboard: Mutex<Vec<Vec<u8>>>,
    pub notifications: Mutex<usize>,
    pub fail_clipboard: bool,
}

impl RecordingDesktop {
    pub fn clipboard(&self) -> Vec<Vec<u8>> {
        self.clipboard.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> usize {
        *self.notifications.lock().unwrap()
    }
}

impl Desktop for RecordingDesktop {
    fn set_clipboard<'a>(&'a self, text: &'a [u8]) -> BoxFuture<'a, Result<(), ToolError>> {
        self.clipboard.lock().unwrap().push(text.to_vec());
        let fail = self.fail_clipboard;
        Box::pin(async move {
            if fail {
                return Err(ToolError::NotFound { program: "xclip".into() });
            }
            Ok(())
        })
    }

    fn notify(&self) -> BoxFuture<'_, Result<(), ToolError>> {
        *self.notifications.lock().unwrap() += 1;
        Box::pin(async { Ok(()) })
    }
}

pub struct Options {
    pub local_only: bool,
    pub token: &'static str,
    pub cors: bool,
    pub fail_clipboard: bool,
    pub timeouts: Timeouts,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            local_only: true,
            token: TOKEN,
            cors: true,
            fail_clipboard: false,
            timeouts: Timeouts::default(),
        }
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub desktop: Arc<RecordingDesktop>,
    pub client: reqwest::Client,
    shutdown: Shutdown,
    handle: JoinHandle<Result<(), Error>>,
}

impl TestServer {
    pub async fn start(opts: Options) -> Self {
        let desktop = Arc::new(RecordingDesktop {
            fail_clipboard: opts.fail_clipboard,
            ..Default::default()
        });
        let state = AppState::new(
            AccessPolicy::new(opts.local_only, opts.token),
            Cors::new(opts.cors),
            Dispatcher::from_arc(Arc::clone(&desktop) as Arc<dyn Desktop>),
        )
        .with_timeouts(opts.timeouts);

        let server = Server::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap()
            .with_timeouts(opts.timeouts);
        let addr = server.local_addr();
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(server.serve(airclip::router(state), shutdown.clone()));

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        Self { addr, desktop, client, shutdown, handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub async fn stop(self) {
        self.shutdown.trigger(ShutdownCause::Interrupt);
        self.handle.await.unwrap().unwrap();
    }
}
