//! Sanitizer application for resolved escaping directives.
//!
//! Which escaping applies where is decided by the excluded autoescape
//! analysis; this module just applies the named transformation.

use weft_core::ast::Escaping;

/// Apply the resolved escaping to already-rendered text.
pub fn apply(escaping: Escaping, text: &str) -> String {
    match escaping {
        Escaping::None => text.to_string(),
        Escaping::Html | Escaping::Attribute => escape_html(text),
        Escaping::Uri => escape_uri(text),
        Escaping::Js => escape_js(text),
        Escaping::Css => escape_css(text),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_uri(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn escape_js(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_css(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '#' | '.' | ','))
        .collect()
}
