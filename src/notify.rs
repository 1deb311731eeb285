//! The `/notify` handler.
//!
//! Check order matters: preflight, source address, method, token, body,
//! then delivery. Nothing reaches the desktop until every check passes, and
//! a non-local caller learns nothing about the token.

use std::sync::Arc;

use http::{Method, StatusCode};
use tracing::{error, info, warn};

use crate::app::AppState;
use crate::middleware::access::client_ip;
use crate::response::IntoResponse;
use crate::{Request, Response};

pub const SENT: &str = "Notification sent and text copied to clipboard";

pub async fn notify(req: Request, state: Arc<AppState>) -> Response {
    if let Some(preflight) = state.cors.preflight(&req) {
        info!(client_ip = %client_ip(&req), "Answered CORS preflight");
        return preflight;
    }
    let res = admit_and_deliver(req, &state).await;
    state.cors.apply(res)
}

async fn admit_and_deliver(mut req: Request, state: &AppState) -> Response {
    let client_ip = client_ip(&req);

    if let Err(rejection) = state.policy.check_source(&client_ip) {
        return rejection.into_response();
    }
    if req.method() != Method::POST {
        warn!(client_ip = %client_ip, method = %req.method(), "Rejected {} request", req.method());
        return Response::error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    }
    if let Err(rejection) = state.policy.check_token(&req, &client_ip) {
        return rejection.into_response();
    }

    let body = match req.read_body(state.timeouts.read).await {
        Ok(body) => body,
        Err(e) => {
            warn!(client_ip = %client_ip, error = %e, "Error reading request body");
            return Response::error(StatusCode::BAD_REQUEST, "Error reading request");
        }
    };
    if body.is_empty() {
        warn!(client_ip = %client_ip, "Rejected empty message from {client_ip}");
        return Response::error(StatusCode::BAD_REQUEST, "Empty message");
    }

    info!(
        client_ip = %client_ip,
        bytes = body.len(),
        "Received notification request from {client_ip}: {} bytes",
        body.len()
    );

    match state.dispatcher.deliver(&body).await {
        Ok(()) => {
            info!(client_ip = %client_ip, "Notification delivered for {client_ip}");
            Response::text(SENT)
        }
        Err(e) => {
            error!(client_ip = %client_ip, error = %e, "Error processing notification");
            Response::error(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {e}"))
        }
    }
}
