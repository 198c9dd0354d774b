// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

//! Access boundary for the proxy routes.
//!
//! An unauthenticated proxy is an open relay, so deployments that expose the
//! gateway can require a bearer token. The credential is consumed here and
//! never forwarded upstream.

use axum::http::{header, request::Parts, HeaderMap, HeaderValue};

use crate::proxy::ProxyError;

/// Cookie that carries the token for iframe navigations, which cannot set headers.
pub const TOKEN_COOKIE: &str = "frameproxy_token";

pub trait AccessPolicy: Send + Sync {
    fn authorize(&self, parts: &Parts) -> Result<(), ProxyError>;

    /// Remove the proxy's own credential from headers bound upstream.
    fn scrub(&self, _headers: &mut HeaderMap) {}
}

/// No access control.
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn authorize(&self, _parts: &Parts) -> Result<(), ProxyError> {
        Ok(())
    }
}

/// Requires `Authorization: Bearer <token>` or the [`TOKEN_COOKIE`] cookie.
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    fn matches(&self, candidate: &str) -> bool {
        constant_time_eq(candidate.as_bytes(), self.token.as_bytes())
    }
}

impl AccessPolicy for BearerToken {
    fn authorize(&self, parts: &Parts) -> Result<(), ProxyError> {
        // 1. Authorization header
        if let Some(token) = bearer(&parts.headers) {
            if self.matches(token) {
                return Ok(());
            }
        }

        // 2. Cookie
        if cookie_values(&parts.headers, TOKEN_COOKIE).any(|value| self.matches(value)) {
            return Ok(());
        }

        Err(ProxyError::Unauthorized)
    }

    fn scrub(&self, headers: &mut HeaderMap) {
        // A page's own Bearer credential is not ours to drop.
        if bearer(headers).is_some_and(|token| self.matches(token)) {
            headers.remove(header::AUTHORIZATION);
        }

        let kept: Vec<String> = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .map(str::trim)
            .filter(|pair| !pair.is_empty() && cookie_name(pair) != TOKEN_COOKIE)
            .map(str::to_owned)
            .collect();

        headers.remove(header::COOKIE);
        if !kept.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&kept.join("; ")) {
                headers.insert(header::COOKIE, value);
            }
        }
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn cookie_name(pair: &str) -> &str {
    pair.split('=').next().unwrap_or_default().trim()
}

fn cookie_values<'a>(headers: &'a HeaderMap, name: &'a str) -> impl Iterator<Item = &'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(move |pair| {
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| value.trim())
        })
}

/// Length leaks; contents do not.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
