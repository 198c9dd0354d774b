// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

use reqwest::Url;
use thiserror::Error;

/// Why a token or URL was refused as a proxy target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTarget {
    #[error("no target given")]
    Empty,
    #[error("malformed percent-escape at byte {0}")]
    MalformedEscape(usize),
    #[error("target is not valid UTF-8")]
    NotUtf8,
    #[error("target is not an absolute URL (no scheme)")]
    MissingScheme,
    #[error("scheme `{0}` is not allowed, only http and https")]
    UnsupportedScheme(String),
    #[error("target is not a valid URL: {0}")]
    Unparseable(String),
}

/// An absolute `http`/`https` URL the proxy may dispatch to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    url: Url,
}

impl ProxyTarget {
    pub fn parse(raw: &str) -> Result<Self, InvalidTarget> {
        let scheme = scheme_of(raw).ok_or(InvalidTarget::MissingScheme)?;
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            return Err(InvalidTarget::UnsupportedScheme(scheme.to_ascii_lowercase()));
        }

        let url = Url::parse(raw).map_err(|e| InvalidTarget::Unparseable(e.to_string()))?;
        Self::from_url(url)
    }

    /// `url` already parsed; http(s) URLs always carry a host.
    pub fn from_url(url: Url) -> Result<Self, InvalidTarget> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(InvalidTarget::UnsupportedScheme(url.scheme().to_owned()));
        }
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn into_url(self) -> Url {
        self.url
    }

    /// `scheme://host[:port]`, default ports omitted.
    pub fn origin(&self) -> String {
        origin_of(&self.url)
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Append an inbound query string (e.g. a GET form submission) to the target.
    pub fn append_query(&mut self, extra: &str) {
        if extra.is_empty() {
            return;
        }
        let merged = match self.url.query() {
            Some(existing) if !existing.is_empty() => format!("{existing}&{extra}"),
            _ => extra.to_owned(),
        };
        self.url.set_query(Some(&merged));
    }
}

impl std::fmt::Display for ProxyTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.url.fmt(f)
    }
}

pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// RFC 3986 scheme: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) before the first `:`,
/// and that `:` must come before any path, query or fragment delimiter.
fn scheme_of(raw: &str) -> Option<&str> {
    let trimmed = raw.trim_start();
    let colon = trimmed.find(':')?;
    let scheme = &trimmed[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    chars
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        .then_some(scheme)
}
