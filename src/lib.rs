// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

//! Transparent web-content proxy for embedded browsing.
//!
//! Pages are fetched server-side and returned with framing restrictions
//! removed; HTML documents additionally get a `<base>` tag and a small client
//! runtime that keeps later cross-origin requests on the proxy.

#![warn(clippy::all)]

pub mod config;
pub mod gateway;
pub mod proxy;
