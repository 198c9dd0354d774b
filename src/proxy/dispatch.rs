// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

//! Upstream dispatcher — issues the outbound request, follows redirects
//! internally and hands back the final response as a byte stream.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::{Client, Url};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::debug;

use super::error::ProxyError;
use super::target::{origin_of, ProxyTarget};

/// Upstream body as delivered to the response side.
pub type BodyStream = BoxStream<'static, io::Result<Bytes>>;

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Wall-clock bound on connect + response headers, across the whole redirect chain.
    pub upstream_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_redirects: usize,
    pub max_concurrent: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            upstream_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_redirects: 10,
            max_concurrent: 256,
        }
    }
}

/// What the inbound request contributes to the outbound one.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    /// Buffered so 307/308 can replay it.
    pub body: Bytes,
}

/// URLs visited while resolving 3xx responses.
///
/// Holds at most `max_redirects` hops after the start URL; one more is a
/// terminal failure.
#[derive(Debug, Clone)]
pub struct RedirectChain {
    start: Url,
    hops: Vec<Url>,
    max_redirects: usize,
}

impl RedirectChain {
    pub fn new(start: Url, max_redirects: usize) -> Self {
        Self {
            start,
            hops: Vec::new(),
            max_redirects,
        }
    }

    pub fn current(&self) -> &Url {
        self.hops.last().unwrap_or(&self.start)
    }

    pub fn redirects(&self) -> usize {
        self.hops.len()
    }

    pub fn follow(&mut self, next: Url) -> Result<(), ProxyError> {
        if self.hops.len() >= self.max_redirects {
            return Err(ProxyError::TooManyRedirects {
                max: self.max_redirects,
                last: next.to_string(),
            });
        }
        self.hops.push(next);
        Ok(())
    }
}

/// The final, non-redirect upstream response.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// URL after every redirect; its origin becomes the document `<base>`.
    pub final_url: Url,
    pub redirects: usize,
    pub body: BodyStream,
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("final_url", &self.final_url.as_str())
            .field("redirects", &self.redirects)
            .finish_non_exhaustive()
    }
}

pub struct Dispatcher {
    client: Client,
    settings: DispatcherSettings,
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(settings: DispatcherSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .connect_timeout(settings.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(settings.max_concurrent.max(1))),
            settings,
        })
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    /// Fetch `target`, following redirects sequentially.
    ///
    /// No retries: a failed upstream surfaces immediately. The concurrency
    /// permit travels with the returned body and is released when the body is
    /// drained or dropped (client disconnect drops it, which closes the
    /// upstream connection).
    pub async fn fetch(
        &self,
        target: ProxyTarget,
        request: OutboundRequest,
    ) -> Result<UpstreamResponse, ProxyError> {
        // Waiting for a free slot counts against the same deadline.
        let deadline = Instant::now() + self.settings.upstream_timeout;
        let permit =
            match tokio::time::timeout_at(deadline, Arc::clone(&self.permits).acquire_owned())
                .await
            {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(ProxyError::Internal("upstream limiter closed".into())),
                Err(_) => {
                    debug!(host = target.host(), "no upstream slot freed before the deadline");
                    return Err(ProxyError::UpstreamTimeout {
                        host: target.host().to_owned(),
                        timeout: self.settings.upstream_timeout,
                    });
                }
            };

        let OutboundRequest {
            mut method,
            mut headers,
            mut body,
        } = request;
        let mut chain = RedirectChain::new(target.into_url(), self.settings.max_redirects);

        loop {
            let url = chain.current().clone();
            let response = self.send(&url, &method, &headers, &body, deadline).await?;
            let status = response.status();

            if status.is_redirection() {
                if let Some(location) = response.headers().get(header::LOCATION) {
                    let next = resolve_location(&url, location)?;
                    debug!(
                        from = %url,
                        to = %next,
                        status = status.as_u16(),
                        hop = chain.redirects() + 1,
                        "following upstream redirect"
                    );

                    if origin_of(&next) != origin_of(&url) {
                        headers.remove(header::AUTHORIZATION);
                        headers.remove(header::COOKIE);
                    }
                    chain.follow(next)?;

                    if switches_to_get(status, &method) {
                        method = Method::GET;
                        body = Bytes::new();
                        headers.remove(header::CONTENT_TYPE);
                    }
                    continue;
                }
            }

            let headers = response.headers().clone();
            let body = response
                .bytes_stream()
                .map(move |chunk| {
                    let _held = &permit;
                    chunk.map_err(io::Error::other)
                })
                .boxed();

            return Ok(UpstreamResponse {
                status,
                headers,
                final_url: url,
                redirects: chain.redirects(),
                body,
            });
        }
    }

    async fn send(
        &self,
        url: &Url,
        method: &Method,
        headers: &HeaderMap,
        body: &Bytes,
        deadline: Instant,
    ) -> Result<reqwest::Response, ProxyError> {
        let host = url.host_str().unwrap_or_default();
        let mut builder = self
            .client
            .request(method.clone(), url.clone())
            .headers(headers.clone());
        if !body.is_empty() {
            builder = builder.body(body.clone());
        }

        let timed_out = || ProxyError::UpstreamTimeout {
            host: host.to_owned(),
            timeout: self.settings.upstream_timeout,
        };

        match tokio::time::timeout_at(deadline, builder.send()).await {
            Err(_) => Err(timed_out()),
            Ok(Err(e)) if e.is_timeout() => Err(timed_out()),
            Ok(Err(e)) => Err(ProxyError::connection(host, describe(&e))),
            Ok(Ok(response)) => Ok(response),
        }
    }
}

/// Resolve a `Location` header against the URL that produced it.
pub fn resolve_location(current: &Url, location: &HeaderValue) -> Result<Url, ProxyError> {
    let host = current.host_str().unwrap_or_default();
    let raw = String::from_utf8_lossy(location.as_bytes());
    let next = current.join(raw.trim()).map_err(|e| {
        ProxyError::connection(host, format!("unresolvable redirect location `{raw}`: {e}"))
    })?;

    if !matches!(next.scheme(), "http" | "https") {
        return Err(ProxyError::connection(
            host,
            format!("redirect to unsupported scheme `{}`", next.scheme()),
        ));
    }
    Ok(next)
}

/// 301/302/303 turn anything but GET/HEAD into a bodiless GET; 307/308 replay.
fn switches_to_get(status: StatusCode, method: &Method) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
    ) && *method != Method::GET
        && *method != Method::HEAD
}

/// reqwest's top-level message hides the cause ("error sending request");
/// walk the source chain.
fn describe(err: &reqwest::Error) -> String {
    use std::error::Error as _;

    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn chain_starts_at_target() {
        let chain = RedirectChain::new(url("https://a.example/"), 3);
        assert_eq!(chain.current().as_str(), "https://a.example/");
        assert_eq!(chain.redirects(), 0);
    }

    #[test]
    fn chain_accepts_up_to_bound_then_fails() {
        let mut chain = RedirectChain::new(url("https://a.example/"), 2);
        chain.follow(url("https://b.example/")).unwrap();
        chain.follow(url("https://a.example/")).unwrap();
        assert_eq!(chain.redirects(), 2);

        let err = chain.follow(url("https://b.example/")).unwrap_err();
        assert!(matches!(err, ProxyError::TooManyRedirects { max: 2, .. }));
        assert_eq!(chain.redirects(), 2, "failed hop must not be recorded");
        assert_eq!(chain.current().as_str(), "https://a.example/");
    }

    #[test]
    fn zero_bound_rejects_first_redirect() {
        let mut chain = RedirectChain::new(url("https://a.example/"), 0);
        assert!(chain.follow(url("https://b.example/")).is_err());
    }

    #[test]
    fn resolves_absolute_location() {
        let next = resolve_location(
            &url("https://a.example/x/y"),
            &HeaderValue::from_static("https://c.example/z"),
        )
        .unwrap();
        assert_eq!(next.as_str(), "https://c.example/z");
    }

    #[test]
    fn resolves_relative_locations() {
        let current = url("https://a.example/dir/page?x=1");
        let abs_path =
            resolve_location(&current, &HeaderValue::from_static("/login")).unwrap();
        assert_eq!(abs_path.as_str(), "https://a.example/login");

        let rel = resolve_location(&current, &HeaderValue::from_static("next")).unwrap();
        assert_eq!(rel.as_str(), "https://a.example/dir/next");

        let scheme_relative =
            resolve_location(&current, &HeaderValue::from_static("//cdn.example/a")).unwrap();
        assert_eq!(scheme_relative.as_str(), "https://cdn.example/a");
    }

    #[test]
    fn rejects_non_http_redirect_targets() {
        let err = resolve_location(
            &url("https://a.example/"),
            &HeaderValue::from_static("javascript:alert(1)"),
        )
        .unwrap_err();
        assert!(matches!(err, ProxyError::UpstreamConnection { .. }));
    }

    #[test]
    fn method_rewrite_follows_redirect_class() {
        for status in [
            StatusCode::MOVED_PERMANENTLY,
            StatusCode::FOUND,
            StatusCode::SEE_OTHER,
        ] {
            for method in [Method::POST, Method::PUT, Method::DELETE, Method::PATCH] {
                assert!(switches_to_get(status, &method), "{status} {method}");
            }
            assert!(!switches_to_get(status, &Method::GET));
            assert!(!switches_to_get(status, &Method::HEAD));
        }
        assert!(!switches_to_get(StatusCode::TEMPORARY_REDIRECT, &Method::PUT));
        assert!(!switches_to_get(StatusCode::PERMANENT_REDIRECT, &Method::POST));
    }

    #[tokio::test]
    async fn waiting_for_a_slot_is_bounded_by_the_deadline() {
        let dispatcher = Dispatcher::new(DispatcherSettings {
            upstream_timeout: Duration::from_millis(200),
            max_concurrent: 1,
            ..DispatcherSettings::default()
        })
        .unwrap();
        let _busy = Arc::clone(&dispatcher.permits).acquire_owned().await.unwrap();

        let target = ProxyTarget::parse("http://127.0.0.1:9/never").unwrap();
        let request = OutboundRequest {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };
        let result = tokio::time::timeout(Duration::from_secs(3), dispatcher.fetch(target, request))
            .await
            .expect("fetch must give up once the deadline passes");

        assert!(matches!(
            result,
            Err(ProxyError::UpstreamTimeout { ref host, .. }) if host == "127.0.0.1"
        ));
    }

    #[test]
    fn default_settings_match_documented_bounds() {
        let settings = DispatcherSettings::default();
        assert_eq!(settings.upstream_timeout, Duration::from_secs(30));
        assert_eq!(settings.max_redirects, 10);
        assert!(settings.max_concurrent > 0);
    }
}
