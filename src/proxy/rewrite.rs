// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

//! HTML rewriter.
//!
//! Injects two things into a buffered document:
//!
//! - the client runtime `<script>`, as early as possible: after `<!doctype>`,
//!   else after `<html>`, else after `<head>`;
//! - `<base href="{origin}/">` as the first child of `<head>`.
//!
//! Markers count only as leading markup: whitespace, comments and a byte order
//! mark may precede them. Without any of them both tags are prepended, script
//! first. Matching works on raw bytes, so documents in any ASCII-compatible
//! charset come out byte-identical apart from the inserted tags.

use std::sync::OnceLock;

use regex::bytes::Regex;

/// The earliest structural marker found in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionAnchor {
    /// Byte offset just past `<!doctype ...>`.
    Doctype { end: usize },
    /// Byte offset just past the opening `<html ...>`.
    Html { end: usize },
    /// Byte offset just past the opening `<head ...>`.
    Head { end: usize },
    /// No marker; insert at `start`, just past any byte order mark.
    Fragment { start: usize },
}

/// Where each injected tag goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionPlan {
    pub anchor: InjectionAnchor,
    /// End of the opening `<head>` tag, if the document has one.
    pub head_end: Option<usize>,
}

fn doctype_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i-u)^<!doctype\b[^>]*>").expect("valid doctype regex"))
}

fn html_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i-u)^<html(?:\s[^>]*)?>").expect("valid html regex"))
}

// `<header>` must not match.
fn head_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i-u)^<head(?:\s[^>]*)?>").expect("valid head regex"))
}

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Skip whitespace, comments and `<?...>` instructions starting at `pos`.
///
/// An unterminated comment swallows the rest of the document.
fn skip_prologue(doc: &[u8], mut pos: usize) -> usize {
    loop {
        while doc.get(pos).is_some_and(u8::is_ascii_whitespace) {
            pos += 1;
        }
        let rest = &doc[pos..];
        let (open, close): (&[u8], &[u8]) = if rest.starts_with(b"<!--") {
            (b"<!--", b"-->")
        } else if rest.starts_with(b"<?") {
            (b"<?", b">")
        } else {
            return pos;
        };
        let body = &rest[open.len()..];
        match body.windows(close.len()).position(|w| w == close) {
            Some(at) => pos += open.len() + at + close.len(),
            None => return doc.len(),
        }
    }
}

/// Match `pattern` at `pos` once the prologue is skipped; returns the tag end.
fn leading_tag(pattern: &Regex, doc: &[u8], pos: usize) -> Option<usize> {
    let start = skip_prologue(doc, pos);
    pattern.find(&doc[start..]).map(|m| start + m.end())
}

/// Locate the injection points of `doc`.
///
/// Markers only count as the leading markup of the document. A `<!doctype>`
/// quoted in a later comment or script must not pull the runtime behind the
/// page's own scripts.
pub fn plan(doc: &[u8]) -> InjectionPlan {
    let start = if doc.starts_with(BOM) { BOM.len() } else { 0 };
    let doctype = leading_tag(doctype_pattern(), doc, start);
    let html = leading_tag(html_pattern(), doc, doctype.unwrap_or(start));
    let head_end = leading_tag(head_pattern(), doc, html.or(doctype).unwrap_or(start));

    let anchor = match (doctype, html, head_end) {
        (Some(end), _, _) => InjectionAnchor::Doctype { end },
        (None, Some(end), _) => InjectionAnchor::Html { end },
        (None, None, Some(end)) => InjectionAnchor::Head { end },
        (None, None, None) => InjectionAnchor::Fragment { start },
    };

    InjectionPlan { anchor, head_end }
}

/// `<base href="{origin}/">` with the href attribute-escaped.
pub fn base_tag(origin: &str) -> String {
    let mut href = String::with_capacity(origin.len() + 1);
    for c in origin.chars() {
        match c {
            '&' => href.push_str("&amp;"),
            '"' => href.push_str("&quot;"),
            '<' => href.push_str("&lt;"),
            '>' => href.push_str("&gt;"),
            _ => href.push(c),
        }
    }
    format!("<base href=\"{href}/\">")
}

/// Rewrite `doc` so it resolves relative URLs against `origin` and runs
/// `script_tag` before any of its own scripts.
pub fn rewrite_html(doc: &[u8], origin: &str, script_tag: &str) -> Vec<u8> {
    let base = base_tag(origin);
    let plan = plan(doc);

    let inserts: Vec<(usize, String)> = match plan.anchor {
        InjectionAnchor::Doctype { end } | InjectionAnchor::Html { end } => match plan.head_end {
            Some(head_end) => vec![(end, script_tag.to_owned()), (head_end, base)],
            None => vec![(end, format!("{script_tag}{base}"))],
        },
        InjectionAnchor::Head { end } => vec![(end, format!("{base}{script_tag}"))],
        InjectionAnchor::Fragment { start } => vec![(start, format!("{script_tag}{base}"))],
    };

    splice(doc, &inserts)
}

/// Insert each snippet at its offset. Offsets must be ascending.
fn splice(doc: &[u8], inserts: &[(usize, String)]) -> Vec<u8> {
    let extra: usize = inserts.iter().map(|(_, s)| s.len()).sum();
    let mut out = Vec::with_capacity(doc.len() + extra);
    let mut cursor = 0;
    for (at, snippet) in inserts {
        out.extend_from_slice(&doc[cursor..*at]);
        out.extend_from_slice(snippet.as_bytes());
        cursor = *at;
    }
    out.extend_from_slice(&doc[cursor..]);
    out
}
