// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::http::HeaderValue;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::proxy::headers::{
    UpstreamIdentity, DEFAULT_ACCEPT, DEFAULT_ACCEPT_LANGUAGE, DEFAULT_USER_AGENT,
};
use crate::proxy::DispatcherSettings;

/// Environment variables that override the config file.
pub const ENV_HOST: &str = "FRAMEPROXY_HOST";
pub const ENV_PORT: &str = "FRAMEPROXY_PORT";
pub const ENV_PREFIX: &str = "FRAMEPROXY_PREFIX";
pub const ENV_ACCESS_TOKEN: &str = "FRAMEPROXY_ACCESS_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub proxy: ProxyConfig,
}

// ── Gateway ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Bind non-loopback addresses. Off by default: the proxy is an open relay.
    pub allow_public_bind: bool,
    /// Largest inbound request body forwarded upstream.
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            allow_public_bind: false,
            max_body_bytes: 100 * 1024 * 1024,
        }
    }
}

// ── Proxy ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Path prefix the proxy route is mounted under; starts and ends with `/`.
    pub prefix: String,
    pub max_redirects: usize,
    pub upstream_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// HTML documents above this size are streamed without rewriting.
    pub max_html_bytes: usize,
    pub max_concurrent_upstream: usize,
    pub forward_cookies: bool,
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    /// Require `Authorization: Bearer <token>` (or the `frameproxy_token` cookie).
    pub access_token: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            prefix: "/proxy/".into(),
            max_redirects: 10,
            upstream_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_html_bytes: 16 * 1024 * 1024,
            max_concurrent_upstream: 256,
            forward_cookies: false,
            user_agent: DEFAULT_USER_AGENT.into(),
            accept: DEFAULT_ACCEPT.into(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.into(),
            access_token: None,
        }
    }
}

impl ProxyConfig {
    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            upstream_timeout: Duration::from_secs(self.upstream_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            max_redirects: self.max_redirects,
            max_concurrent: self.max_concurrent_upstream,
        }
    }

    pub fn identity(&self) -> Result<UpstreamIdentity> {
        Ok(UpstreamIdentity {
            user_agent: HeaderValue::from_str(&self.user_agent)
                .context("proxy.user_agent is not a valid header value")?,
            accept: HeaderValue::from_str(&self.accept)
                .context("proxy.accept is not a valid header value")?,
            accept_language: HeaderValue::from_str(&self.accept_language)
                .context("proxy.accept_language is not a valid header value")?,
        })
    }
}

impl Config {
    /// `config.toml` in the platform config dir, e.g. `~/.config/frameproxy/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "frameproxy", "frameproxy")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path` (or the default location), apply environment
    /// overrides and validate. A missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match path {
            Some(ref path) if path.exists() => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::from_toml(&raw)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            Some(ref path) => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides_with(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Environment wins over the file. `lookup` is injectable for tests.
    pub fn apply_env_overrides_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(host) = non_empty(ENV_HOST) {
            self.gateway.host = host;
        }
        if let Some(port) = non_empty(ENV_PORT) {
            match port.parse() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!("ignoring {ENV_PORT}={port}: not a port number"),
            }
        }
        if let Some(prefix) = non_empty(ENV_PREFIX) {
            self.proxy.prefix = prefix;
        }
        if let Some(token) = non_empty(ENV_ACCESS_TOKEN) {
            self.proxy.access_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let prefix = &self.proxy.prefix;
        if prefix.len() < 2 || !prefix.starts_with('/') || !prefix.ends_with('/') {
            bail!("proxy.prefix must start and end with '/' and name a path (got {prefix:?})");
        }
        if prefix.contains(['{', '}', '*', '?', '#']) {
            bail!("proxy.prefix may not contain route or query syntax (got {prefix:?})");
        }
        if self.proxy.max_redirects == 0 {
            bail!("proxy.max_redirects must be at least 1");
        }
        if self.proxy.upstream_timeout_secs == 0 || self.proxy.connect_timeout_secs == 0 {
            bail!("proxy timeouts must be at least 1 second");
        }
        if self.proxy.max_concurrent_upstream == 0 {
            bail!("proxy.max_concurrent_upstream must be at least 1");
        }
        if matches!(self.proxy.access_token.as_deref(), Some(t) if t.trim().is_empty()) {
            bail!("proxy.access_token is set but empty");
        }
        self.proxy.identity()?;
        Ok(())
    }
}
