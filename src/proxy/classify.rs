// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

//! Content classifier — HTML is buffered and rewritten, everything else streams.

use axum::http::{header, HeaderMap};

/// How a response body travels to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentStrategy {
    /// Pipe upstream chunks through as they arrive.
    Passthrough,
    /// Buffer the whole document, inject base tag + runtime, send with a fresh length.
    Rewrite,
}

/// Bytes inspected when the upstream omits `Content-Type`.
pub const SNIFF_LEN: usize = 512;

/// Leading tags that mark a body as HTML when no type was declared.
const HTML_SIGNATURES: &[&[u8]] = &[
    b"<!doctype html",
    b"<html",
    b"<head",
    b"<script",
    b"<iframe",
    b"<h1",
    b"<div",
    b"<font",
    b"<table",
    b"<a",
    b"<style",
    b"<title",
    b"<b",
    b"<body",
    b"<br",
    b"<p",
    b"<!--",
];

/// `text/html`, case-insensitive, parameters ignored.
pub fn is_html(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .eq_ignore_ascii_case("text/html")
}

/// Strategy from the declared type; `None` when there is no usable `Content-Type`.
pub fn classify(headers: &HeaderMap) -> Option<ContentStrategy> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    if value.trim().is_empty() {
        return None;
    }
    Some(if is_html(value) {
        ContentStrategy::Rewrite
    } else {
        ContentStrategy::Passthrough
    })
}

/// Decide from the first body bytes.
pub fn sniff(prefix: &[u8]) -> ContentStrategy {
    let data = prefix.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(prefix);
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let data = &data[start..];

    if HTML_SIGNATURES.iter().any(|sig| has_signature(data, sig)) {
        ContentStrategy::Rewrite
    } else {
        ContentStrategy::Passthrough
    }
}

fn has_signature(data: &[u8], signature: &[u8]) -> bool {
    data.len() > signature.len()
        && data[..signature.len()].eq_ignore_ascii_case(signature)
        && matches!(data[signature.len()], b' ' | b'>' | b'\t' | b'\n' | b'\r' | b'\x0c')
}
