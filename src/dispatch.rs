//! Clipboard and notification delivery.
//!
//! [`Dispatcher::deliver`] runs two external tools in order: the clipboard
//! setter, then the notifier. A clipboard failure skips the notifier.
//!
//! The payload is written to the clipboard tool's stdin. No shell is
//! involved, so quotes, `$`, backticks, blank lines and trailing newlines
//! reach the clipboard byte for byte.
//!
//! Tools are reached through the [`Desktop`] trait so the HTTP layer can be
//! exercised without a graphical session.

use std::fmt;
use std::fs::File;
use std::future::Future;
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

/// Upper bound on the stderr kept for an error message.
const STDERR_LIMIT: u64 = 4096;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ── Errors ────────────────────────────────────────────────────────────────────

/// A single tool invocation failed.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{program}: executable file not found")]
    NotFound { program: String },

    #[error("{program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program}: {status}{stderr}")]
    Failed { program: String, status: ExitStatus, stderr: Stderr },

    #[error("{program}: {var} is not set, no desktop session to reach")]
    MissingEnv { program: String, var: String },

    #[error("empty command line")]
    Empty,

    #[error("invalid command line: {0}")]
    Parse(#[from] shell_words::ParseError),
}

/// What a failed tool wrote to stderr, shown after its exit status.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Stderr(pub String);

impl fmt::Display for Stderr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        write!(f, ": {}", self.0)
    }
}

/// Delivery failed. The message is what the client sees after `Error: `.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to copy to clipboard: {0}")]
    Clipboard(#[source] ToolError),

    #[error("failed to send notification: {0}")]
    Notify(#[source] ToolError),
}

// ── Desktop seam ──────────────────────────────────────────────────────────────

/// The two side effects a delivery has on the desktop session.
pub trait Desktop: Send + Sync + 'static {
    /// Replaces the clipboard contents with exactly `text`.
    fn set_clipboard<'a>(&'a self, text: &'a [u8]) -> BoxFuture<'a, Result<(), ToolError>>;

    /// Raises the "text copied" notification.
    fn notify(&self) -> BoxFuture<'_, Result<(), ToolError>>;
}

/// Runs both steps in order. Cheap to clone; handlers share one.
#[derive(Clone)]
pub struct Dispatcher {
    desktop: Arc<dyn Desktop>,
}

impl Dispatcher {
    pub fn new(desktop: impl Desktop) -> Self {
        Self { desktop: Arc::new(desktop) }
    }

    pub fn from_arc(desktop: Arc<dyn Desktop>) -> Self {
        Self { desktop }
    }

    pub async fn deliver(&self, text: &[u8]) -> Result<(), DispatchError> {
        self.desktop
            .set_clipboard(text)
            .await
            .map_err(DispatchError::Clipboard)?;
        self.desktop.notify().await.map_err(DispatchError::Notify)
    }
}

// ── Process-backed implementation ─────────────────────────────────────────────

/// An external program plus its arguments.
#[derive(Clone, Debug)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    required_env: Vec<String>,
}

impl ToolCommand {
    pub fn new<I, A>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            required_env: Vec::new(),
        }
    }

    /// Splits a command line with POSIX shell quoting rules. The line is
    /// never run through a shell.
    pub fn parse(line: &str) -> Result<Self, ToolError> {
        let mut words = shell_words::split(line)?.into_iter();
        let program = words.next().ok_or(ToolError::Empty)?;
        Ok(Self::new(program, words))
    }

    /// Refuse to launch unless `var` is set and non-empty.
    pub fn require_env(mut self, var: impl Into<String>) -> Self {
        self.required_env.push(var.into());
        self
    }

    pub fn program(&self) -> &str { &self.program }
    pub fn args(&self) -> &[String] { &self.args }
    pub fn required_env(&self) -> &[String] { &self.required_env }

    /// Runs the tool to completion, feeding `input` on stdin when given.
    ///
    /// stdout goes to `/dev/null` and stderr to an unlinked temporary file:
    /// clipboard tools such as `xclip` fork a background owner of the
    /// selection that would hold a pipe open until the selection changes.
    /// A file is read back once the tool itself has exited.
    pub async fn run(&self, input: Option<&[u8]>) -> Result<(), ToolError> {
        for var in &self.required_env {
            if std::env::var_os(var).is_none_or(|v| v.is_empty()) {
                return Err(ToolError::MissingEnv {
                    program: self.program.clone(),
                    var: var.clone(),
                });
            }
        }

        let io_err = |source: io::Error| ToolError::Io { program: self.program.clone(), source };
        let errlog = tempfile::tempfile().map_err(io_err)?;
        let child_stderr = errlog.try_clone().map_err(io_err)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::null())
            .stderr(child_stderr)
            .spawn()
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => ToolError::NotFound { program: self.program.clone() },
                _ => ToolError::Spawn { program: self.program.clone(), source },
            })?;

        let mut fed = Ok(());
        if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
            fed = stdin.write_all(input).await;
            // Dropping the pipe delivers EOF.
            drop(stdin);
        }

        let status = child.wait().await.map_err(io_err)?;
        debug!(program = %self.program, %status, "tool finished");

        if !status.success() {
            let stderr = read_stderr(errlog).await.unwrap_or_else(|e| {
                debug!(program = %self.program, "could not read tool stderr: {e}");
                Stderr::default()
            });
            return Err(ToolError::Failed { program: self.program.clone(), status, stderr });
        }
        fed.map_err(io_err)
    }
}

async fn read_stderr(file: File) -> io::Result<Stderr> {
    let mut file = tokio::fs::File::from_std(file);
    file.seek(SeekFrom::Start(0)).await?;
    let mut buf = Vec::new();
    file.take(STDERR_LIMIT).read_to_end(&mut buf).await?;
    Ok(Stderr(String::from_utf8_lossy(&buf).trim().to_owned()))
}

/// Desktop backed by two external programs.
#[derive(Clone, Debug)]
pub struct CommandDesktop {
    clipboard: ToolCommand,
    notifier: ToolCommand,
}

impl CommandDesktop {
    pub fn new(clipboard: ToolCommand, notifier: ToolCommand) -> Self {
        Self { clipboard, notifier }
    }

    pub fn clipboard(&self) -> &ToolCommand { &self.clipboard }
    pub fn notifier(&self) -> &ToolCommand { &self.notifier }
}

impl Desktop for CommandDesktop {
    fn set_clipboard<'a>(&'a self, text: &'a [u8]) -> BoxFuture<'a, Result<(), ToolError>> {
        Box::pin(self.clipboard.run(Some(text)))
    }

    fn notify(&self) -> BoxFuture<'_, Result<(), ToolError>> {
        Box::pin(self.notifier.run(None))
    }
}
