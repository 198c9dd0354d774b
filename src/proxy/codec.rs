// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

//! URL codec — embeds an absolute target URL into one path segment of the
//! proxy's own URL space.
//!
//! Every second UTF-16 code unit is XOR-ed with [`XOR_KEY`], then the result is
//! escaped with the `encodeURIComponent` character set. The client runtime
//! performs the exact same transform in the browser, so both sides must stay in
//! lockstep. This is obfuscation only: the key is public and the transform is
//! trivially invertible. Never treat a token as proof of anything.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::target::{InvalidTarget, ProxyTarget};

/// Key applied to every odd-indexed UTF-16 code unit.
pub const XOR_KEY: u16 = 2;

/// Everything `encodeURIComponent` escapes.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// XOR is its own inverse, so this serves both directions.
///
/// Flipping bit 1 never moves a code unit across a surrogate boundary, so a
/// well-formed string stays well-formed.
fn xor_alternate(input: &str) -> String {
    let units = input
        .encode_utf16()
        .enumerate()
        .map(|(i, unit)| if i % 2 == 1 { unit ^ XOR_KEY } else { unit });

    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Encode an absolute URL into a path-segment token.
pub fn encode(url: &str) -> String {
    utf8_percent_encode(&xor_alternate(url), URI_COMPONENT).to_string()
}

/// Decode a token produced by [`encode`] back into the target URL.
///
/// The result is validated as an absolute `http`/`https` URL. A token that was
/// encoded twice never carries a scheme after a single decode (the encoded
/// form contains no `:`), so it is rejected instead of yielding a wrong target.
pub fn decode(token: &str) -> Result<String, InvalidTarget> {
    if token.is_empty() {
        return Err(InvalidTarget::Empty);
    }
    check_escapes(token)?;

    let unescaped = percent_decode_str(token)
        .decode_utf8()
        .map_err(|_| InvalidTarget::NotUtf8)?;
    let target = xor_alternate(&unescaped);

    ProxyTarget::parse(&target)?;
    Ok(target)
}

/// Decode straight into a validated [`ProxyTarget`].
pub fn decode_target(token: &str) -> Result<ProxyTarget, InvalidTarget> {
    ProxyTarget::parse(&decode(token)?)
}

/// Full proxy path (`{prefix}{token}`) for a target URL.
pub fn proxy_path(prefix: &str, url: &str) -> String {
    format!("{prefix}{}", encode(url))
}

/// `percent_decode_str` silently passes broken escapes through; reject them.
fn check_escapes(token: &str) -> Result<(), InvalidTarget> {
    let bytes = token.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(InvalidTarget::MalformedEscape(i));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}
