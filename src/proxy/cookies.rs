// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

//! `Set-Cookie` handling for proxied responses.
//!
//! Upstream cookies are either dropped or re-scoped to the proxy: the `Domain`
//! attribute would name a host the browser is not talking to, and the `Path`
//! must cover the proxy prefix for the cookie to ever come back.

use axum::http::{header, HeaderMap, HeaderValue};

/// Drop or rewrite every `Set-Cookie` in `headers`.
pub fn apply(headers: &mut HeaderMap, forward_cookies: bool, prefix: &str) {
    let originals: Vec<HeaderValue> = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .cloned()
        .collect();
    headers.remove(header::SET_COOKIE);

    if !forward_cookies {
        return;
    }

    for value in originals {
        let Ok(raw) = value.to_str() else {
            continue;
        };
        if let Ok(rewritten) = HeaderValue::from_str(&rescope(raw, prefix)) {
            headers.append(header::SET_COOKIE, rewritten);
        }
    }
}

/// Strip `Domain`, force `Path={prefix}`, keep every other attribute.
pub fn rescope(set_cookie: &str, prefix: &str) -> String {
    let mut parts = set_cookie.split(';');
    let pair = parts.next().unwrap_or_default().trim();

    let mut out = String::with_capacity(set_cookie.len() + prefix.len());
    out.push_str(pair);
    for attr in parts {
        let attr = attr.trim();
        if attr.is_empty() {
            continue;
        }
        let name = attr.split('=').next().unwrap_or_default().trim();
        if name.eq_ignore_ascii_case("domain") || name.eq_ignore_ascii_case("path") {
            continue;
        }
        out.push_str("; ");
        out.push_str(attr);
    }
    out.push_str("; Path=");
    out.push_str(prefix);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescope_strips_domain_and_forces_path() {
        let rewritten = rescope(
            "sid=abc123; Domain=.example.com; Path=/account; HttpOnly; SameSite=Lax",
            "/proxy/",
        );
        assert_eq!(rewritten, "sid=abc123; HttpOnly; SameSite=Lax; Path=/proxy/");
    }

    #[test]
    fn rescope_handles_bare_pair() {
        assert_eq!(rescope("a=b", "/p/"), "a=b; Path=/p/");
    }

    #[test]
    fn rescope_keeps_expires_with_commas() {
        let rewritten = rescope("a=b; Expires=Wed, 21 Oct 2026 07:28:00 GMT; domain=x.y", "/p/");
        assert_eq!(rewritten, "a=b; Expires=Wed, 21 Oct 2026 07:28:00 GMT; Path=/p/");
    }

    #[test]
    fn apply_drops_cookies_when_forwarding_disabled() {
        let mut headers = HeaderMap::new();
        headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));
        apply(&mut headers, false, "/proxy/");
        assert!(headers.get(header::SET_COOKIE).is_none());
    }

    #[test]
    fn apply_rewrites_each_cookie_when_enabled() {
        let mut headers = HeaderMap::new();
        headers.append(
            header::SET_COOKIE,
            HeaderValue::from_static("a=1; Domain=example.com"),
        );
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2; Secure"));
        apply(&mut headers, true, "/proxy/");

        let cookies: Vec<_> = headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_owned())
            .collect();
        assert_eq!(cookies, vec!["a=1; Path=/proxy/", "b=2; Secure; Path=/proxy/"]);
    }
}
