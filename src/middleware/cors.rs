//! Permissive CORS for `/notify`, so browser-based senders can post.

use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    HeaderValue,
};
use http::{Method, StatusCode};

use crate::request::Request;
use crate::response::Response;

#[derive(Clone, Copy, Debug)]
pub struct Cors {
    enabled: bool,
}

impl Cors {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Answers a preflight. Returns `None` when CORS is off or the request
    /// is not `OPTIONS`; such requests go through the normal checks.
    pub fn preflight(&self, req: &Request) -> Option<Response> {
        if !self.enabled || req.method() != Method::OPTIONS {
            return None;
        }
        Some(self.apply(Response::status(StatusCode::OK)))
    }

    /// Adds the allow headers to `res` when CORS is on.
    pub fn apply(&self, res: Response) -> Response {
        if !self.enabled {
            return res;
        }
        res.with_header(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"))
            .with_header(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST, OPTIONS"))
            .with_header(
                ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type, Authorization"),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;

    fn options() -> Request {
        Request::from_parts(Method::OPTIONS, HeaderMap::new(), "203.0.113.5:1".parse().unwrap(), "")
    }

    #[test]
    fn preflight_when_enabled() {
        let res = Cors::new(true).preflight(&options()).expect("preflight answered");
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        assert_eq!(res.header("access-control-allow-methods"), Some("POST, OPTIONS"));
        assert_eq!(res.header("access-control-allow-headers"), Some("Content-Type, Authorization"));
    }

    #[test]
    fn disabled_passes_through() {
        let cors = Cors::new(false);
        assert!(cors.preflight(&options()).is_none());
        let res = cors.apply(Response::text("x"));
        assert!(res.header("access-control-allow-origin").is_none());
    }
}
