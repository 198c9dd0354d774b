// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

//! Turns an [`UpstreamResponse`] into the response the browser receives.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::Response,
};
use futures_util::{StreamExt, TryStreamExt};
use tracing::{debug, warn};

use super::classify::{self, ContentStrategy, SNIFF_LEN};
use super::cookies;
use super::dispatch::{BodyStream, UpstreamResponse};
use super::error::ProxyError;
use super::headers;
use super::prebuffer::Prebuffered;
use super::rewrite::rewrite_html;
use super::runtime::{self, RuntimeOptions};
use super::target::origin_of;

/// Per-deployment knobs that shape the outgoing response.
#[derive(Debug, Clone, Copy)]
pub struct ResponsePolicy<'a> {
    pub prefix: &'a str,
    /// Larger HTML documents stream through unmodified.
    pub max_html_bytes: usize,
    pub forward_cookies: bool,
}

/// Filter headers, then stream or rewrite the body.
///
/// Errors here happen before any byte reaches the browser. Failures after
/// that point truncate the passthrough body and are only logged.
pub async fn respond(
    upstream: UpstreamResponse,
    method: &Method,
    policy: &ResponsePolicy<'_>,
) -> Result<Response, ProxyError> {
    let UpstreamResponse {
        status,
        headers: upstream_headers,
        final_url,
        redirects,
        body,
    } = upstream;

    let mut headers = headers::filter(&upstream_headers);
    cookies::apply(&mut headers, policy.forward_cookies, policy.prefix);
    let host = final_url.host_str().unwrap_or_default().to_owned();

    if *method == Method::HEAD || !carries_body(status) {
        return Ok(assemble(status, headers, Body::empty()));
    }

    let mut buffered = Prebuffered::new(body);
    let strategy = match classify::classify(&upstream_headers) {
        Some(strategy) => strategy,
        None => {
            buffered
                .fill_to(SNIFF_LEN)
                .await
                .map_err(|e| ProxyError::connection(&host, format!("reading body: {e}")))?;
            let sniffed = classify::sniff(buffered.buffer());
            if sniffed == ContentStrategy::Rewrite {
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
            }
            sniffed
        }
    };
    debug!(%final_url, redirects, status = status.as_u16(), ?strategy, "upstream response");

    if strategy == ContentStrategy::Passthrough {
        return Ok(assemble(status, headers, passthrough(buffered.into_stream(), host)));
    }

    buffered
        .fill_to(policy.max_html_bytes.saturating_add(1))
        .await
        .map_err(|e| ProxyError::connection(&host, format!("reading document: {e}")))?;

    if !buffered.is_finished() || buffered.buffer().len() > policy.max_html_bytes {
        warn!(
            host = %host,
            limit = policy.max_html_bytes,
            "HTML document exceeds rewrite limit, streaming it unmodified"
        );
        return Ok(assemble(status, headers, passthrough(buffered.into_stream(), host)));
    }

    let (document, _) = buffered.into_parts();
    if document.is_empty() {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(0));
        return Ok(assemble(status, headers, Body::empty()));
    }

    let origin = origin_of(&final_url);
    let base_href = format!("{origin}/");
    let script = runtime::script_tag(&RuntimeOptions {
        prefix: policy.prefix,
        base_href: &base_href,
    });
    let rewritten = rewrite_html(&document, &origin, &script);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));

    Ok(assemble(status, headers, Body::from(rewritten)))
}

/// 1xx, 204 and 304 never carry a body.
fn carries_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

fn passthrough(stream: BodyStream, host: String) -> Body {
    Body::from_stream(
        stream
            .inspect_err(move |e| warn!(host = %host, "upstream body ended early: {e}"))
            .boxed(),
    )
}

fn assemble(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
