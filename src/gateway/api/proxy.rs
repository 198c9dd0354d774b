// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};

use http_body_util::LengthLimitError;

use super::auth::{AccessPolicy, AllowAll, BearerToken};
use crate::config::Config;
use crate::proxy::{
    codec, headers, respond, Dispatcher, InvalidTarget, OutboundRequest, ProxyError,
    ResponsePolicy, UpstreamIdentity,
};

/// Everything a proxy request needs; cheap to clone per request.
#[derive(Clone)]
pub struct ProxyState {
    pub dispatcher: Arc<Dispatcher>,
    /// Mount point, e.g. `/proxy/`.
    pub prefix: Arc<str>,
    pub identity: UpstreamIdentity,
    pub max_html_bytes: usize,
    pub max_body_bytes: usize,
    pub forward_cookies: bool,
    pub access: Arc<dyn AccessPolicy>,
}

impl ProxyState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let dispatcher = Dispatcher::new(config.proxy.dispatcher_settings())
            .context("building upstream HTTP client")?;
        let access: Arc<dyn AccessPolicy> = match config.proxy.access_token.as_deref() {
            Some(token) => Arc::new(BearerToken::new(token)),
            None => Arc::new(AllowAll),
        };

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            prefix: Arc::from(config.proxy.prefix.as_str()),
            identity: config.proxy.identity()?,
            max_html_bytes: config.proxy.max_html_bytes,
            max_body_bytes: config.gateway.max_body_bytes,
            forward_cookies: config.proxy.forward_cookies,
            access,
        })
    }
}

/// Proxy routes under the configured prefix, mergeable into any router.
pub fn router<S>(state: ProxyState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let prefix = state.prefix.to_string();
    let bare = prefix.trim_end_matches('/').to_owned();

    Router::new()
        .route(&format!("{prefix}{{*target}}"), any(proxy_handler))
        // No token at all
        .route(&prefix, any(missing_target))
        .route(&bare, any(missing_target))
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .with_state(state)
}

async fn missing_target() -> Response {
    ProxyError::from(InvalidTarget::Empty).into_response()
}

async fn proxy_handler(State(state): State<ProxyState>, req: Request) -> Response {
    match forward(&state, req).await {
        Ok(response) => response,
        Err(e) => {
            match e.status() {
                StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
                    tracing::warn!(kind = e.kind(), "proxy request failed: {e}");
                }
                _ => tracing::debug!(kind = e.kind(), "proxy request rejected: {e}"),
            }
            e.into_response()
        }
    }
}

async fn forward(state: &ProxyState, req: Request) -> Result<Response, ProxyError> {
    let (parts, body) = req.into_parts();

    // Raw path: the codec does its own percent-decoding.
    let token = parts
        .uri
        .path()
        .strip_prefix(&*state.prefix)
        .unwrap_or_default();
    let mut target = codec::decode_target(token)?;
    if let Some(query) = parts.uri.query() {
        target.append_query(query);
    }

    if is_preflight(&parts) {
        return Ok(preflight_response());
    }
    state.access.authorize(&parts)?;

    let body = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| body_error(e, state.max_body_bytes))?;

    let mut outbound =
        headers::forward_request_headers(&parts.headers, &state.identity, state.forward_cookies);
    state.access.scrub(&mut outbound);

    tracing::info!(method = %parts.method, host = target.host(), "proxying");
    tracing::debug!(target = %target, "decoded target");

    let upstream = state
        .dispatcher
        .fetch(
            target,
            OutboundRequest {
                method: parts.method.clone(),
                headers: outbound,
                body,
            },
        )
        .await?;

    respond(
        upstream,
        &parts.method,
        &ResponsePolicy {
            prefix: &state.prefix,
            max_html_bytes: state.max_html_bytes,
            forward_cookies: state.forward_cookies,
        },
    )
    .await
}

/// Over the limit is 413; an aborted or broken upload is the caller's 400.
fn body_error(err: axum::Error, limit: usize) -> ProxyError {
    let inner = err.into_inner();
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&*inner);
    while let Some(cause) = source {
        if cause.is::<LengthLimitError>() {
            return ProxyError::BodyTooLarge { limit };
        }
        source = cause.source();
    }
    ProxyError::RequestBody(inner.to_string())
}

fn is_preflight(parts: &Parts) -> bool {
    parts.method == Method::OPTIONS
        && parts
            .headers
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

fn preflight_response() -> Response {
    let mut headers = HeaderMap::new();
    headers::apply_cors(&mut headers);
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    *response.headers_mut() = headers;
    response
}
