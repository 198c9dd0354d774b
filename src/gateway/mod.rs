// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

//! Axum-based HTTP gateway hosting the proxy routes.
//!
//! - `GET /health` — liveness, always public
//! - `ANY {prefix}{token}` — the proxy itself (see [`api::proxy`])
//! - anything else — JSON 404
//!
//! Request bodies are capped by `gateway.max_body_bytes`. There is no
//! whole-request timeout: passthrough bodies may stream for as long as the
//! client keeps reading.

pub mod api;

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use api::ProxyState;

#[derive(Clone)]
struct GatewayState {
    prefix: String,
}

/// The full gateway application for `config`.
pub fn app(config: &Config) -> Result<Router> {
    let proxy = ProxyState::from_config(config)?;
    let state = GatewayState {
        prefix: config.proxy.prefix.clone(),
    };

    Ok(Router::new()
        .route("/health", get(handle_health))
        .merge(api::router(proxy))
        .fallback(handle_not_found)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(config.gateway.max_body_bytes))
        .layer(TraceLayer::new_for_http()))
}

/// True unless `host` is a loopback name or address.
pub fn is_public_bind(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.eq_ignore_ascii_case("localhost") {
        return false;
    }
    match host.parse::<IpAddr>() {
        Ok(ip) => !ip.is_loopback(),
        Err(_) => true,
    }
}

/// Run the gateway until Ctrl+C.
pub async fn run_gateway(config: Config) -> Result<()> {
    let host = config.gateway.host.as_str();
    let port = config.gateway.port;

    // ── Security: refuse public bind without explicit opt-in ──
    if is_public_bind(host) && !config.gateway.allow_public_bind {
        anyhow::bail!(
            "🛑 Refusing to bind to {host} — the proxy would be an open relay on the network.\n\
             Fix: use --host 127.0.0.1 (default), or set\n\
             [gateway] allow_public_bind = true in config.toml (set proxy.access_token too)."
        );
    }

    let app = app(&config)?;

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    let actual_port = listener.local_addr()?.port();
    let display_addr = format!("{host}:{actual_port}");
    let prefix = &config.proxy.prefix;

    println!("🪟 frameproxy listening on http://{display_addr}");
    println!("  ANY  {prefix}<token>  — proxied target (frameproxy encode <url>)");
    println!("  GET  /health         — health check");
    if config.proxy.access_token.is_some() {
        println!("  🔒 Access token: REQUIRED (Bearer header or frameproxy_token cookie)");
    } else {
        println!("  ⚠️  Access token: DISABLED (all requests accepted)");
    }
    if config.proxy.forward_cookies {
        println!("  🍪 Cookies: forwarded and re-scoped to {prefix}");
    }
    println!("  Press Ctrl+C to stop.\n");

    tracing::info!(addr = %display_addr, %prefix, "gateway started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /health — always public
async fn handle_health(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "prefix": state.prefix,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "not found", "kind": "not_found"})),
    )
}
