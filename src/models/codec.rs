// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The iRODS-XML codec.
//!
//! iRODS bodies are XML documents, but the server side speaks a dialect:
//! only the five named entities (`&amp; &lt; &gt; &quot; &apos;`) exist,
//! numeric references show up for quote characters depending on the server
//! version, and raw `&` bytes can appear unescaped inside values. Standard
//! XML tooling therefore runs behind a pre-decode repair pass, and values
//! we build by hand go through [`escape_xml`]/[`unescape_xml`].

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{IrodsError, Result};

/// Serializes a message body. Empty elements are expanded
/// (`<units></units>`), matching what server-side parsers accept.
pub fn marshal<T: Serialize>(value: &T) -> Result<String> {
    let mut out = String::new();
    let mut ser = quick_xml::se::Serializer::new(&mut out);
    ser.expand_empty_elements(true);
    value
        .serialize(ser)
        .map_err(|e| IrodsError::protocol("xml marshal", e.to_string()))?;
    Ok(out)
}

/// Deserializes a message body after repairing the server dialect.
pub fn unmarshal<T: DeserializeOwned>(raw: &[u8]) -> Result<T> {
    let text = String::from_utf8_lossy(raw);
    let repaired = repair_entities(&text);
    quick_xml::de::from_str(&repaired)
        .map_err(|e| IrodsError::protocol("xml unmarshal", e.to_string()))
}

/// Escapes one value with the entity table the wire dialect understands.
pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_xml`], additionally accepting the numeric quote
/// forms some server versions emit.
pub fn unescape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        let mut matched = false;
        for (entity, ch) in [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&apos;", '\''),
            ("&#34;", '"'),
            ("&#39;", '\''),
        ] {
            if rest.starts_with(entity) {
                out.push(ch);
                rest = &rest[entity.len()..];
                matched = true;
                break;
            }
        }
        if !matched {
            out.push('&');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Rewrites a server document into standard XML: any `&` that does not
/// introduce a known named or numeric entity becomes `&amp;`.
pub fn repair_entities(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while let Some(rel) = text[i..].find('&') {
        let at = i + rel;
        out.push_str(&text[i..at]);
        if is_entity_start(&bytes[at..]) {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
        i = at + 1;
    }
    out.push_str(&text[i..]);
    out
}

fn is_entity_start(bytes: &[u8]) -> bool {
    for named in [&b"&amp;"[..], b"&lt;", b"&gt;", b"&quot;", b"&apos;"] {
        if bytes.starts_with(named) {
            return true;
        }
    }
    // numeric reference: &#123; or &#x7f;
    if bytes.len() < 4 || bytes[1] != b'#' {
        return false;
    }
    let digits = if bytes[2] == b'x' || bytes[2] == b'X' {
        &bytes[3..]
    } else {
        &bytes[2..]
    };
    let end = match digits.iter().position(|&b| b == b';') {
        Some(0) | None => return false,
        Some(end) => end,
    };
    digits[..end].iter().all(|b| b.is_ascii_hexdigit())
}
