//! Command-line and environment configuration.
//!
//! Parsed once at startup into [`Config`], then frozen into the
//! [`AppState`](crate::AppState) every handler shares. Nothing reads flags
//! after that.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::dispatch::{CommandDesktop, ToolCommand, ToolError};
use crate::middleware::{AccessPolicy, Cors};

pub const DEFAULT_PORT: u16 = 9123;
pub const DEFAULT_TOKEN: &str = "local-use-only";
pub const DEFAULT_CLIPBOARD_COMMAND: &str = "xclip -selection clipboard";
pub const DEFAULT_NOTIFY_COMMAND: &str = "notify-send --app-name=NotificationServer \
     --icon=dialog-information 'Text copied to clipboard from Airclip'";

/// Relay posted text to the desktop clipboard and raise a notification.
#[derive(Parser, Debug, Clone)]
#[command(name = "airclip", version, about)]
pub struct Config {
    /// IP address to listen on (use local IPs only)
    #[arg(long, env = "AIRCLIP_LISTEN", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub listen: IpAddr,

    /// HTTP port to listen on
    #[arg(long, env = "AIRCLIP_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Shared bearer token; empty disables the check
    #[arg(long, env = "AIRCLIP_TOKEN", default_value = DEFAULT_TOKEN)]
    pub token: String,

    /// Restrict to local network connections only
    #[arg(long, env = "AIRCLIP_LOCAL_ONLY", default_value_t = true, action = ArgAction::Set)]
    pub local_only: bool,

    /// Enable CORS for cross-origin requests
    #[arg(long, env = "AIRCLIP_CORS", default_value_t = true, action = ArgAction::Set)]
    pub cors: bool,

    /// Directory to store log files
    #[arg(long = "logdir", env = "AIRCLIP_LOGDIR", default_value = "/tmp")]
    pub log_dir: PathBuf,

    /// Command that receives the text on stdin and sets the clipboard
    #[arg(long, env = "AIRCLIP_CLIPBOARD_COMMAND", default_value = DEFAULT_CLIPBOARD_COMMAND)]
    pub clipboard_command: String,

    /// Command that raises the desktop notification
    #[arg(long, env = "AIRCLIP_NOTIFY_COMMAND", default_value = DEFAULT_NOTIFY_COMMAND)]
    pub notify_command: String,
}

impl Config {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen, self.port)
    }

    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::new(self.local_only, &self.token)
    }

    pub fn cors(&self) -> Cors {
        Cors::new(self.cors)
    }

    /// Builds the process-spawning desktop from the two command lines.
    ///
    /// The default `xclip` command needs an X session, so it also requires
    /// `DISPLAY`. A custom clipboard command carries no such requirement.
    pub fn desktop(&self) -> Result<CommandDesktop, ToolError> {
        let mut clipboard = ToolCommand::parse(&self.clipboard_command)?;
        if clipboard.program() == "xclip" {
            clipboard = clipboard.require_env("DISPLAY");
        }
        let notifier = ToolCommand::parse(&self.notify_command)?;
        Ok(CommandDesktop::new(clipboard, notifier))
    }
}

/// Connection and lifecycle timeouts.
#[derive(Clone, Copy, Debug)]
pub struct Timeouts {
    /// Request headers, and separately the request body, must arrive within this.
    pub read: Duration,
    /// A response must be ready this long after the request started.
    pub write: Duration,
    /// A connection with no socket traffic for this long is closed.
    pub idle: Duration,
    /// Graceful drain budget before open connections are force-closed.
    pub drain: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(10),
            write: Duration::from_secs(10),
            idle: Duration::from_secs(60),
            drain: Duration::from_secs(5),
        }
    }
}
