//! Console and per-run log file.
//!
//! Every event goes to stdout and to
//! `<logdir>/notification-server_YYYY-MM-DD_HH-MM-SS.log`. The file writer is
//! synchronous so nothing is buffered when the process exits abruptly on a
//! second interrupt.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y/%m/%d %H:%M:%S"))
    }
}

pub fn log_file_path(dir: &Path, started: DateTime<Local>) -> PathBuf {
    dir.join(format!(
        "notification-server_{}.log",
        started.format("%Y-%m-%d_%H-%M-%S")
    ))
}

/// Installs the global subscriber. Returns the log file path.
///
/// `RUST_LOG` overrides the default `info` filter.
pub fn init(log_dir: &Path) -> io::Result<PathBuf> {
    let path = log_file_path(log_dir, Local::now());
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console = fmt::layer()
        .with_target(false)
        .with_timer(LocalTimer);

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_timer(LocalTimer);

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(path)
}
