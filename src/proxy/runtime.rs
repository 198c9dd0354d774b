// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

//! Client runtime — the script injected into every rewritten page.
//!
//! Rendered from one template (`runtime.js`) with three substitutions: the
//! proxy prefix, the `<base>` href and the codec key. Inside the page it pins
//! `top`/`parent`/`frameElement`, neutralises `window.stop`, routes cross-origin
//! `fetch`/XHR URLs back through the proxy and replaces `WebSocket` with a
//! closed stub.

use super::codec::XOR_KEY;

const TEMPLATE: &str = include_str!("runtime.js");

const PREFIX_SLOT: &str = "__FRAMEPROXY_PREFIX__";
const BASE_SLOT: &str = "__FRAMEPROXY_BASE__";
const KEY_SLOT: &str = "__FRAMEPROXY_XOR_KEY__";

#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions<'a> {
    /// Path prefix the proxy is mounted under, e.g. `/proxy/`.
    pub prefix: &'a str,
    /// Href of the injected `<base>`, i.e. `{origin}/`.
    pub base_href: &'a str,
}

/// Render the runtime JavaScript.
pub fn render(options: &RuntimeOptions<'_>) -> String {
    TEMPLATE
        .replace(PREFIX_SLOT, &js_string(options.prefix))
        .replace(BASE_SLOT, &js_string(options.base_href))
        .replace(KEY_SLOT, &XOR_KEY.to_string())
}

/// Render the runtime wrapped in its `<script>` element.
pub fn script_tag(options: &RuntimeOptions<'_>) -> String {
    format!(
        "<script data-frameproxy-runtime>{}</script>",
        render(options)
    )
}

/// JSON string literal, safe inside an inline `<script>`.
fn js_string(value: &str) -> String {
    serde_json::Value::from(value)
        .to_string()
        .replace('<', "\\u003c")
}
