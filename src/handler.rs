//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! The router holds handlers of *different* types in one radix tree, so each
//! is hidden behind `dyn ErasedHandler<S>`. Every handler also receives the
//! shared application state `S` by `Arc`, which is how configuration and
//! the dispatcher reach request code without globals.
//!
//! ```text
//! async fn notify(req: Request, state: Arc<AppState>) -> Response { … }
//!        ↓ router.route("/notify", notify)
//! notify.into_boxed_handler()                      ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(notify))                      ← stored as BoxedHandler<S>
//!        ↓
//! handler.call(req, Arc::clone(&state))            ← one vtable dispatch
//!        ↓
//! Box::pin(async { notify(req, state).await.into_response() })
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

#[doc(hidden)]
pub trait ErasedHandler<S> {
    fn call(&self, req: Request, state: Arc<S>) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedHandler<S> = Arc<dyn ErasedHandler<S> + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Satisfied automatically by any function with the signature:
///
/// ```text
/// async fn name(req: Request, state: Arc<S>) -> impl IntoResponse
/// ```
///
/// Sealed: only the blanket impl below can satisfy it.
pub trait Handler<S>: private::Sealed<S> + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler<S>;
}

mod private {
    pub trait Sealed<S> {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R, S> private::Sealed<S> for F
where
    F: Fn(Request, Arc<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R, S> Handler<S> for F
where
    F: Fn(Request, Arc<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
    S: Send + Sync + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler<S> {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

struct FnHandler<F>(F);

impl<F, Fut, R, S> ErasedHandler<S> for FnHandler<F>
where
    F: Fn(Request, Arc<S>) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request, state: Arc<S>) -> BoxFuture {
        let fut = (self.0)(req, state);
        Box::pin(async move { fut.await.into_response() })
    }
}
