//! Request admission.
//!
//! Cross-cutting checks that run before a handler touches the body:
//!
//! - [`access`]: local-network source check and bearer-token check
//! - [`cors`]: preflight answers and allow headers

pub mod access;
pub mod cors;

pub use access::{AccessPolicy, Rejection};
pub use cors::Cors;
