// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

//! Header policy — which upstream response headers reach the browser, and
//! which inbound request headers reach the upstream.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Response headers never forwarded to the browser.
///
/// Security headers here would block framing or the injected runtime; transport
/// headers become wrong once the body is re-streamed or rewritten.
pub const DENIED_RESPONSE_HEADERS: &[&str] = &[
    "content-security-policy",
    "content-security-policy-report-only",
    "x-frame-options",
    "strict-transport-security",
    "cross-origin-opener-policy",
    "cross-origin-embedder-policy",
    "cross-origin-resource-policy",
    "content-encoding",
    "transfer-encoding",
    "content-length",
    "connection",
    "keep-alive",
    "trailer",
    "upgrade",
    "access-control-allow-credentials",
];

/// Hop-by-hop headers (RFC 9110 §7.6.1) plus proxy credentials.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Headers that identify the proxy host or the original client.
const HOST_IDENTIFYING: &[&str] = &["host", "origin", "referer", "forwarded", "x-real-ip"];

pub const CORS_ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS, HEAD";

/// Fixed browser-like identity presented to every upstream.
#[derive(Debug, Clone)]
pub struct UpstreamIdentity {
    pub user_agent: HeaderValue,
    pub accept: HeaderValue,
    pub accept_language: HeaderValue,
}

impl Default for UpstreamIdentity {
    fn default() -> Self {
        Self {
            user_agent: HeaderValue::from_static(DEFAULT_USER_AGENT),
            accept: HeaderValue::from_static(DEFAULT_ACCEPT),
            accept_language: HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE),
        }
    }
}

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

pub fn is_denied(name: &HeaderName) -> bool {
    DENIED_RESPONSE_HEADERS.contains(&name.as_str())
}

/// Filter upstream response headers for the browser.
///
/// Drops everything on the deny-list and forces permissive CORS. Total over any
/// header map; never fails.
pub fn filter(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len() + 4);
    for (name, value) in headers {
        if !is_denied(name) {
            out.append(name.clone(), value.clone());
        }
    }
    apply_cors(&mut out);
    out
}

/// Force `Access-Control-Allow-*` regardless of what the origin sent.
pub fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("*"),
    );
}

fn is_stripped_request_header(name: &str) -> bool {
    HOP_BY_HOP.contains(&name)
        || HOST_IDENTIFYING.contains(&name)
        || name.starts_with("x-forwarded-")
        || name == "content-length"
        || name == "accept-encoding"
}

/// Build the header set sent upstream from the inbound request headers.
///
/// Headers listed in an inbound `Connection` header are hop-by-hop too.
pub fn forward_request_headers(
    inbound: &HeaderMap,
    identity: &UpstreamIdentity,
    forward_cookies: bool,
) -> HeaderMap {
    let connection_listed: Vec<String> = inbound
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    let mut out = HeaderMap::with_capacity(inbound.len() + 4);
    for (name, value) in inbound {
        let key = name.as_str();
        if is_stripped_request_header(key)
            || connection_listed.iter().any(|listed| listed == key)
            || (!forward_cookies && *name == header::COOKIE)
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }

    out.insert(header::USER_AGENT, identity.user_agent.clone());
    out.insert(header::ACCEPT, identity.accept.clone());
    out.insert(header::ACCEPT_LANGUAGE, identity.accept_language.clone());
    out.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.append(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        headers
    }

    #[test]
    fn strips_framing_and_encoding_headers() {
        let upstream = map(&[
            ("content-security-policy", "default-src 'none'"),
            ("x-frame-options", "DENY"),
            ("content-encoding", "gzip"),
            ("content-length", "1234"),
            ("strict-transport-security", "max-age=63072000"),
            ("cross-origin-opener-policy", "same-origin"),
            ("content-type", "text/html"),
        ]);

        let filtered = filter(&upstream);
        assert!(filtered.get("content-security-policy").is_none());
        assert!(filtered.get("x-frame-options").is_none());
        assert!(filtered.get("content-encoding").is_none());
        assert!(filtered.get("content-length").is_none());
        assert!(filtered.get("strict-transport-security").is_none());
        assert!(filtered.get("cross-origin-opener-policy").is_none());
        assert_eq!(filtered.get("content-type").unwrap(), "text/html");
    }

    #[test]
    fn forces_permissive_cors_over_upstream_values() {
        let upstream = map(&[
            ("access-control-allow-origin", "https://only-me.example"),
            ("access-control-allow-credentials", "true"),
        ]);
        let filtered = filter(&upstream);
        assert_eq!(filtered.get("access-control-allow-origin").unwrap(), "*");
        assert_eq!(
            filtered.get("access-control-allow-methods").unwrap(),
            CORS_ALLOW_METHODS
        );
        assert_eq!(filtered.get("access-control-allow-headers").unwrap(), "*");
        assert!(filtered.get("access-control-allow-credentials").is_none());
        assert_eq!(filtered.get_all("access-control-allow-origin").iter().count(), 1);
    }

    #[test]
    fn filter_handles_empty_map() {
        let filtered = filter(&HeaderMap::new());
        assert_eq!(filtered.len(), 4);
    }

    #[test]
    fn filter_keeps_repeated_headers() {
        let upstream = map(&[("link", "</a.css>; rel=preload"), ("link", "</b.js>; rel=preload")]);
        assert_eq!(filter(&upstream).get_all("link").iter().count(), 2);
    }

    #[test]
    fn request_headers_drop_hop_by_hop_and_host_identity() {
        let inbound = map(&[
            ("host", "proxy.local:8080"),
            ("origin", "http://proxy.local:8080"),
            ("referer", "http://proxy.local:8080/proxy/abc"),
            ("x-forwarded-for", "10.0.0.1"),
            ("connection", "keep-alive, x-custom-hop"),
            ("x-custom-hop", "1"),
            ("proxy-authorization", "Basic Zm9vOmJhcg=="),
            ("content-length", "3"),
            ("content-type", "application/json"),
            ("x-requested-with", "XMLHttpRequest"),
        ]);

        let out = forward_request_headers(&inbound, &UpstreamIdentity::default(), false);
        for dropped in [
            "host",
            "origin",
            "referer",
            "x-forwarded-for",
            "connection",
            "x-custom-hop",
            "proxy-authorization",
            "content-length",
        ] {
            assert!(out.get(dropped).is_none(), "{dropped} should be stripped");
        }
        assert_eq!(out.get("content-type").unwrap(), "application/json");
        assert_eq!(out.get("x-requested-with").unwrap(), "XMLHttpRequest");
    }

    #[test]
    fn request_headers_force_identity_and_no_compression() {
        let inbound = map(&[
            ("user-agent", "curl/8.0"),
            ("accept-encoding", "gzip, br"),
            ("accept-language", "de-DE"),
        ]);
        let out = forward_request_headers(&inbound, &UpstreamIdentity::default(), false);
        assert_eq!(out.get("user-agent").unwrap(), DEFAULT_USER_AGENT);
        assert_eq!(out.get("accept-encoding").unwrap(), "identity");
        assert_eq!(out.get("accept-language").unwrap(), DEFAULT_ACCEPT_LANGUAGE);
        assert_eq!(out.get("accept").unwrap(), DEFAULT_ACCEPT);
        assert_eq!(out.get_all("accept-encoding").iter().count(), 1);
    }

    #[test]
    fn cookies_forwarded_only_when_enabled() {
        let inbound = map(&[("cookie", "sid=abc")]);
        let identity = UpstreamIdentity::default();
        assert!(forward_request_headers(&inbound, &identity, false)
            .get("cookie")
            .is_none());
        assert_eq!(
            forward_request_headers(&inbound, &identity, true)
                .get("cookie")
                .unwrap(),
            "sid=abc"
        );
    }
}
