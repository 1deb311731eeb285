//! Source-address and bearer-token admission.
//!
//! # Forwarded addresses
//!
//! When `X-Forwarded-For` is present its first entry is taken as the client
//! address, with no check that the connection came from a trusted proxy.
//! Any client that can reach the port can therefore claim a local address.
//! The behaviour is kept for compatibility with setups behind a local
//! reverse proxy; it is not a security boundary.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use http::header::AUTHORIZATION;
use http::{HeaderValue, StatusCode};
use tracing::{debug, warn};

use crate::request::Request;
use crate::response::{IntoResponse, Response};

pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Who may use `/notify`. Built once from the configuration.
#[derive(Clone, Debug)]
pub struct AccessPolicy {
    local_only: bool,
    token: Option<String>,
}

/// Why a request was turned away.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rejection {
    NonLocal,
    Unauthorized,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match self {
            Self::NonLocal => Response::error(
                StatusCode::FORBIDDEN,
                "This service is restricted to local network use only",
            ),
            Self::Unauthorized => Response::error(StatusCode::UNAUTHORIZED, "Unauthorized"),
        }
    }
}

impl AccessPolicy {
    /// An empty `token` disables the token check.
    pub fn new(local_only: bool, token: &str) -> Self {
        let token = (!token.is_empty()).then(|| token.to_owned());
        Self { local_only, token }
    }

    pub fn token(&self) -> Option<&str> { self.token.as_deref() }

    /// Rejects non-local clients when local-only mode is on.
    pub fn check_source(&self, client_ip: &str) -> Result<(), Rejection> {
        if !self.local_only || is_local_ip(client_ip) {
            return Ok(());
        }
        warn!(client_ip = %client_ip, "Rejected non-local request from {client_ip}");
        Err(Rejection::NonLocal)
    }

    /// Requires `Authorization: Bearer <token>` when a token is configured.
    pub fn check_token(&self, req: &Request, client_ip: &str) -> Result<(), Rejection> {
        let Some(token) = self.token.as_deref() else {
            return Ok(());
        };
        // Raw bytes: a token outside visible ASCII must still match.
        let presented = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.as_bytes().strip_prefix(b"Bearer "));
        if presented == Some(token.as_bytes()) {
            return Ok(());
        }
        warn!(client_ip = %client_ip, "Unauthorized access attempt from {client_ip}");
        Err(Rejection::Unauthorized)
    }
}

/// The address a request is attributed to: the first `X-Forwarded-For`
/// entry if the header is present, otherwise the socket peer.
pub fn client_ip(req: &Request) -> String {
    let forwarded = req.headers().get(FORWARDED_FOR).map(HeaderValue::as_bytes);
    if let Some(forwarded) = forwarded.filter(|v| !v.is_empty()) {
        let first = forwarded.split(|&b| b == b',').next().unwrap_or_default();
        let first = String::from_utf8_lossy(first).trim().to_owned();
        debug!(
            peer = %req.remote_addr(),
            forwarded_for = %first,
            "client address taken from unverified X-Forwarded-For"
        );
        return first;
    }
    req.remote_addr().ip().to_string()
}

/// Parses and classifies an address string. Anything unparseable,
/// including bracketed or zoned IPv6 forms, is not local.
pub fn is_local_ip(ip: &str) -> bool {
    ip.parse::<IpAddr>().is_ok_and(is_local)
}

/// Loopback, RFC 1918 private ranges, and link-local unicast.
pub fn is_local(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_local_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_local_v4(v4),
            None => v6.is_loopback() || is_link_local_v6(v6),
        },
    }
}

fn is_local_v4(ip: Ipv4Addr) -> bool {
    // is_private covers 10/8, 172.16/12 and 192.168/16.
    ip.is_loopback() || ip.is_private() || ip.is_link_local()
}

// fe80::/10
fn is_link_local_v6(ip: Ipv6Addr) -> bool {
    ip.segments()[0] & 0xffc0 == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method};
    use proptest::prelude::*;

    fn request(peer: &str, headers: &[(&'static str, &str)]) -> Request {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(*name, value.parse().unwrap());
        }
        Request::from_parts(Method::POST, map, peer.parse().unwrap(), "")
    }

    #[test]
    fn named_addresses() {
        for ip in ["127.0.0.1", "127.8.9.10", "::1", "10.0.0.1", "172.16.0.1",
                   "172.31.255.255", "192.168.1.20", "fe80::1", "febf::ffff",
                   "169.254.3.4", "::ffff:192.168.0.7"] {
            assert!(is_local_ip(ip), "{ip} should be local");
        }
        for ip in ["203.0.113.5", "8.8.8.8", "172.15.255.255", "172.32.0.1",
                   "192.169.0.1", "11.0.0.1", "2001:db8::1", "fec0::1",
                   "::ffff:8.8.8.8", "0.0.0.0", "not-an-ip", "", "[::1]", "fe80::1%eth0"] {
            assert!(!is_local_ip(ip), "{ip} should not be local");
        }
    }

    proptest! {
        #[test]
        fn ten_slash_eight(b: u8, c: u8, d: u8) {
            prop_assert!(is_local(Ipv4Addr::new(10, b, c, d).into()));
        }

        #[test]
        fn one_seven_two_sixteen_slash_twelve(b in 16u8..=31, c: u8, d: u8) {
            prop_assert!(is_local(Ipv4Addr::new(172, b, c, d).into()));
        }

        #[test]
        fn one_nine_two_one_six_eight(c: u8, d: u8) {
            prop_assert!(is_local(Ipv4Addr::new(192, 168, c, d).into()));
        }

        #[test]
        fn loopback_v4(b: u8, c: u8, d: u8) {
            prop_assert!(is_local(Ipv4Addr::new(127, b, c, d).into()));
        }

        #[test]
        fn link_local_v6(low in 0u16..0x40, rest: [u16; 7]) {
            let [a, b, c, d, e, f, g] = rest;
            let ip = Ipv6Addr::new(0xfe80 | low, a, b, c, d, e, f, g);
            prop_assert!(is_local(ip.into()));
        }

        #[test]
        fn global_v4_is_not_local(a: u8, b: u8, c: u8, d: u8) {
            let ip = Ipv4Addr::new(a, b, c, d);
            let special = a == 10 || a == 127 || a == 0 || a >= 224
                || (a == 172 && (16..=31).contains(&b))
                || (a == 192 && b == 168)
                || (a == 169 && b == 254)
                || (a == 100 && (64..=127).contains(&b));
            prop_assume!(!special);
            prop_assert!(!is_local(ip.into()));
        }

        #[test]
        fn global_unicast_v6_is_not_local(first in 0x2000u16..0x4000, rest: [u16; 7]) {
            let [a, b, c, d, e, f, g] = rest;
            let ip = Ipv6Addr::new(first, a, b, c, d, e, f, g);
            prop_assert!(!is_local(ip.into()));
        }
    }

    #[test]
    fn forwarded_for_first_entry_wins() {
        let req = request("203.0.113.9:4000", &[("x-forwarded-for", " 192.168.1.4 , 203.0.113.9")]);
        assert_eq!(client_ip(&req), "192.168.1.4");
    }

    #[test]
    fn forwarded_for_with_non_ascii_tail_still_wins() {
        let mut map = HeaderMap::new();
        map.insert(
            "x-forwarded-for",
            HeaderValue::from_bytes("203.0.113.5, proxé".as_bytes()).unwrap(),
        );
        let req = Request::from_parts(Method::POST, map, "127.0.0.1:1".parse().unwrap(), "");
        assert_eq!(client_ip(&req), "203.0.113.5");
        let policy = AccessPolicy::new(true, "");
        assert_eq!(policy.check_source(&client_ip(&req)), Err(Rejection::NonLocal));
    }

    #[test]
    fn peer_address_without_forwarding() {
        assert_eq!(client_ip(&request("127.0.0.1:4000", &[])), "127.0.0.1");
        assert_eq!(client_ip(&request("[::1]:4000", &[])), "::1");
    }

    #[test]
    fn source_check_only_in_local_only_mode() {
        let strict = AccessPolicy::new(true, "t");
        assert_eq!(strict.check_source("203.0.113.5"), Err(Rejection::NonLocal));
        assert_eq!(strict.check_source("192.168.0.2"), Ok(()));

        let open = AccessPolicy::new(false, "t");
        assert_eq!(open.check_source("203.0.113.5"), Ok(()));
    }

    #[test]
    fn token_must_match_exactly() {
        let policy = AccessPolicy::new(true, "local-use-only");
        let check = |headers: &[(&'static str, &str)]| {
            policy.check_token(&request("127.0.0.1:1", headers), "127.0.0.1")
        };
        assert_eq!(check(&[("authorization", "Bearer local-use-only")]), Ok(()));
        assert_eq!(check(&[]), Err(Rejection::Unauthorized));
        for bad in ["Bearer local-use-onlyx", "bearer local-use-only", "local-use-only", "Bearer "] {
            assert_eq!(check(&[("authorization", bad)]), Err(Rejection::Unauthorized), "{bad}");
        }
    }

    #[test]
    fn non_ascii_token_matches_raw_bytes() {
        let policy = AccessPolicy::new(true, "pässwort");
        let with_auth = |value: &str| {
            let mut map = HeaderMap::new();
            map.insert("authorization", HeaderValue::from_bytes(value.as_bytes()).unwrap());
            Request::from_parts(Method::POST, map, "127.0.0.1:1".parse().unwrap(), "")
        };
        assert_eq!(policy.check_token(&with_auth("Bearer pässwort"), "127.0.0.1"), Ok(()));
        assert_eq!(
            policy.check_token(&with_auth("Bearer passwort"), "127.0.0.1"),
            Err(Rejection::Unauthorized)
        );
    }

    #[test]
    fn empty_token_skips_check() {
        let policy = AccessPolicy::new(true, "");
        assert!(policy.token().is_none());
        assert_eq!(policy.check_token(&request("127.0.0.1:1", &[]), "127.0.0.1"), Ok(()));
    }

    #[test]
    fn rejections_map_to_status() {
        assert_eq!(Rejection::NonLocal.into_response().status_code(), StatusCode::FORBIDDEN);
        assert_eq!(Rejection::Unauthorized.into_response().body(), b"Unauthorized\n");
    }
}
