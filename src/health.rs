//! Health-check handler.
//!
//! `/health` answers every method with `200 OK`. If the process can respond
//! to HTTP at all, it is up; the check does not probe the clipboard or
//! notification tools.

use std::sync::Arc;

use tracing::info;

use crate::app::AppState;
use crate::middleware::access::client_ip;
use crate::{Request, Response};

pub async fn health(req: Request, _state: Arc<AppState>) -> Response {
    let client_ip = client_ip(&req);
    info!(client_ip = %client_ip, "Health check from {client_ip}");
    Response::text("Notification server is running")
}
