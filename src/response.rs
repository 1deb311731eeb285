//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Every body airclip sends is short plain text. Build a [`Response`] in the
//! handler and return it; the server turns it into a hyper response.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue, X_CONTENT_TYPE_OPTIONS};
use http::StatusCode;
use http_body_util::Full;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// ```rust
/// use airclip::Response;
/// use http::StatusCode;
///
/// Response::text("Notification server is running");
/// Response::error(StatusCode::FORBIDDEN, "This service is restricted to local network use only");
/// Response::status(StatusCode::OK);
/// ```
#[derive(Debug)]
pub struct Response {
    pub(crate) body: Bytes,
    pub(crate) headers: Vec<(HeaderName, HeaderValue)>,
    pub(crate) status: StatusCode,
}

impl Response {
    /// `200 OK`, `text/plain; charset=utf-8`. A trailing newline is added
    /// so `curl` output ends cleanly.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Plain-text error body with `nosniff`, the same shape for every
    /// client-facing failure.
    pub fn error(code: StatusCode, message: impl Into<String>) -> Self {
        Self::builder()
            .status(code)
            .header(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"))
            .text(message)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { body: Bytes::new(), headers: Vec::new(), status: code }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn body(&self) -> &[u8] { &self.body }

    /// First value of a header set on this response.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.as_str().eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.to_str().ok())
    }

    /// Appends a header, keeping any already present.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        let headers = res.headers_mut();
        for (name, value) in self.headers {
            headers.append(name, value);
        }
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
pub struct ResponseBuilder {
    headers: Vec<(HeaderName, HeaderValue)>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Terminate with a plain-text body.
    pub fn text(self, body: impl Into<String>) -> Response {
        let mut body = body.into();
        if !body.ends_with('\n') {
            body.push('\n');
        }
        let mut headers = vec![(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN))];
        headers.extend(self.headers);
        Response { body: Bytes::from(body), headers, status: self.status }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}
