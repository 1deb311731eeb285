//! Application state and route table.

use crate::config::{Config, Timeouts};
use crate::dispatch::{Dispatcher, ToolError};
use crate::middleware::{AccessPolicy, Cors};
use crate::router::Router;
use crate::{health, notify};

/// Everything a handler may read. Immutable once the server starts.
pub struct AppState {
    pub policy: AccessPolicy,
    pub cors: Cors,
    pub dispatcher: Dispatcher,
    pub timeouts: Timeouts,
}

impl AppState {
    pub fn new(policy: AccessPolicy, cors: Cors, dispatcher: Dispatcher) -> Self {
        Self { policy, cors, dispatcher, timeouts: Timeouts::default() }
    }

    /// State for the real process, with tools spawned as configured.
    pub fn from_config(config: &Config) -> Result<Self, ToolError> {
        let dispatcher = Dispatcher::new(config.desktop()?);
        Ok(Self::new(config.access_policy(), config.cors(), dispatcher))
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// `/notify` and `/health`. Anything else is a 404.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new(state)
        .route("/notify", notify::notify)
        .route("/health", health::health)
}
