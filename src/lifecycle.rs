//! Shutdown coordination and OS signal handling.
//!
//! Two distinct events drive the process down:
//!
//! ```text
//! 1st interrupt ─┐
//!                ├─▶ Shutdown::trigger ─▶ accept loop stops, connections drain
//! server error ──┘
//!
//! 2nd interrupt ───▶ supervise() returns ─▶ process::exit(EXIT_INTERRUPT)
//! ```
//!
//! [`Shutdown`] is a broadcast value every task can observe; it records the
//! first cause and ignores later triggers. The force event is not a flag on
//! it: [`supervise`] simply resolves, and the caller exits.

use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Exit code for startup and runtime errors.
pub const EXIT_ERROR: u8 = 1;

/// Exit code when a second interrupt cuts the drain short.
pub const EXIT_INTERRUPT: i32 = 2;

/// Why the server is shutting down.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShutdownCause {
    Interrupt,
    ServerError,
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("interrupt signal received"),
            Self::ServerError => f.write_str("server error"),
        }
    }
}

/// Cancellation token shared by the accept loop, every connection task and
/// the signal supervisor.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<Option<ShutdownCause>>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Requests shutdown. Returns `false` if it was already requested; the
    /// first cause is kept.
    pub fn trigger(&self, cause: ShutdownCause) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(cause);
            true
        })
    }

    pub fn cause(&self) -> Option<ShutdownCause> {
        *self.tx.borrow()
    }

    /// Resolves once shutdown has been requested, immediately if it already was.
    pub async fn triggered(&self) -> ShutdownCause {
        let mut rx = self.tx.subscribe();
        loop {
            let current = *rx.borrow_and_update();
            if let Some(cause) = current {
                return cause;
            }
            // The sender lives in `self`, so the channel cannot close here.
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns interrupts into shutdown requests.
///
/// The first interrupt triggers a graceful shutdown. If shutdown was already
/// triggered by something else, the next interrupt counts as the second.
/// Resolves on the second interrupt, which the caller must treat as a hard
/// exit. Never resolves if the interrupt feed closes.
pub async fn supervise(mut interrupts: mpsc::Receiver<()>, shutdown: Shutdown) {
    tokio::select! {
        // An interrupt queued behind an earlier trigger is a second one.
        biased;

        _ = shutdown.triggered() => {}
        Some(()) = interrupts.recv() => {
            info!("Interrupt signal received, stopping gracefully");
            shutdown.trigger(ShutdownCause::Interrupt);
        }
    }

    if interrupts.recv().await.is_some() {
        warn!("Interrupt signal received again, stopping immediately");
        return;
    }
    std::future::pending::<()>().await
}

/// Forwards SIGINT and SIGTERM (Ctrl-C off Unix) into a channel, one
/// message per signal.
///
/// Handlers are installed before this returns, so a signal arriving right
/// after startup is not lost.
pub fn os_interrupts() -> io::Result<mpsc::Receiver<()>> {
    let (tx, rx) = mpsc::channel(4);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(()) = sigint.recv() => {}
                    Some(()) = sigterm.recv() => {}
                    else => break,
                }
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });
    }

    #[cfg(not(unix))]
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_cause_wins() {
        let shutdown = Shutdown::new();
        assert_eq!(shutdown.cause(), None);
        assert!(shutdown.trigger(ShutdownCause::ServerError));
        assert!(!shutdown.trigger(ShutdownCause::Interrupt));
        assert_eq!(shutdown.cause(), Some(ShutdownCause::ServerError));
    }

    #[tokio::test]
    async fn triggered_resolves_for_late_observers() {
        let shutdown = Shutdown::new();
        shutdown.trigger(ShutdownCause::Interrupt);
        let cause = tokio::time::timeout(Duration::from_secs(1), shutdown.triggered())
            .await
            .expect("already triggered");
        assert_eq!(cause, ShutdownCause::Interrupt);
    }

    #[tokio::test]
    async fn triggered_wakes_waiting_clones() {
        let shutdown = Shutdown::new();
        let waiter = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { shutdown.triggered().await }
        });
        tokio::task::yield_now().await;
        shutdown.trigger(ShutdownCause::ServerError);
        assert_eq!(waiter.await.unwrap(), ShutdownCause::ServerError);
    }

    #[tokio::test]
    async fn first_interrupt_drains_second_forces() {
        let (tx, rx) = mpsc::channel(4);
        let shutdown = Shutdown::new();
        let mut supervisor = tokio::spawn(supervise(rx, shutdown.clone()));

        tx.send(()).await.unwrap();
        assert_eq!(shutdown.triggered().await, ShutdownCause::Interrupt);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), &mut supervisor).await.is_err(),
            "one interrupt must not force an exit"
        );

        tx.send(()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), supervisor)
            .await
            .expect("second interrupt forces")
            .unwrap();
    }

    #[tokio::test]
    async fn interrupt_after_server_error_forces() {
        let (tx, rx) = mpsc::channel(4);
        let shutdown = Shutdown::new();
        shutdown.trigger(ShutdownCause::ServerError);
        let supervisor = tokio::spawn(supervise(rx, shutdown.clone()));

        tx.send(()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), supervisor)
            .await
            .expect("interrupt during drain forces")
            .unwrap();
        assert_eq!(shutdown.cause(), Some(ShutdownCause::ServerError));
    }

    #[tokio::test]
    async fn closed_feed_never_forces() {
        let (tx, rx) = mpsc::channel::<()>(1);
        drop(tx);
        let shutdown = Shutdown::new();
        shutdown.trigger(ShutdownCause::Interrupt);
        let res = tokio::time::timeout(Duration::from_millis(50), supervise(rx, shutdown)).await;
        assert!(res.is_err());
    }
}
