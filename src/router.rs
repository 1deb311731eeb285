//! Radix-tree request router.
//!
//! Routes are keyed by path only. Method handling belongs to the handler:
//! `/notify` answers OPTIONS and POST and turns everything else into a 405,
//! while `/health` answers any method.

use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler};

/// The application router, carrying the shared state every handler receives.
///
/// Build it once at startup and pass it to [`Server::serve`](crate::Server::serve).
pub struct Router<S> {
    routes: MatchitRouter<BoxedHandler<S>>,
    state: Arc<S>,
}

impl<S: Send + Sync + 'static> Router<S> {
    pub fn new(state: S) -> Self {
        Self { routes: MatchitRouter::new(), state: Arc::new(state) }
    }

    /// Register a handler for `path`. Returns `self` for chaining.
    ///
    /// # Panics
    ///
    /// Panics if `path` is malformed or already registered. Routes are fixed
    /// at startup, so this is a programming error.
    pub fn route(mut self, path: &str, handler: impl Handler<S>) -> Self {
        self.routes
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn state(&self) -> &Arc<S> {
        &self.state
    }

    pub(crate) fn lookup(&self, path: &str) -> Option<BoxedHandler<S>> {
        let matched = self.routes.at(path).ok()?;
        Some(Arc::clone(matched.value))
    }
}
