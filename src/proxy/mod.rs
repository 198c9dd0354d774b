// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

//! Proxy core: target codec, upstream dispatch and response shaping.
//!
//! Request flow: codec decode → [`Dispatcher::fetch`] (redirects resolved
//! internally) → header filter → classifier → passthrough stream or HTML
//! rewrite. The HTTP surface lives in `gateway::api::proxy`.

pub mod classify;
pub mod codec;
pub mod cookies;
pub mod dispatch;
pub mod error;
pub mod headers;
pub mod prebuffer;
pub mod respond;
pub mod rewrite;
pub mod runtime;
pub mod target;

pub use classify::ContentStrategy;
pub use dispatch::{Dispatcher, DispatcherSettings, OutboundRequest, UpstreamResponse};
pub use error::ProxyError;
pub use headers::UpstreamIdentity;
pub use respond::{respond, ResponsePolicy};
pub use target::{InvalidTarget, ProxyTarget};
