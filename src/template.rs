//! Clip-name templates expanded against regex captures.
//!
//! Recognised references:
//!
//! | syntax | meaning |
//! |---|---|
//! | `$name`, `${name}` | named group, or positional when `name` is all digits |
//! | `$$` | a literal `$` |
//! | `\N`, `\NN` | positional group (up to two digits) |
//! | `\g<N>`, `\g<name>` | positional or named group |
//! | `\\`, `\n`, `\t`, `\r` | escapes |
//!
//! A reference to a group that does not exist or did not take part in the
//! match is copied through as written.

use regex::Captures;

fn group<'h>(caps: &Captures<'h>, key: &str) -> Option<&'h str> {
    let m = if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
        key.parse::<usize>().ok().and_then(|i| caps.get(i))
    } else {
        caps.name(key)
    };
    m.map(|m| m.as_str())
}

fn is_ident(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

/// Expand `template` against `caps` in a single left-to-right pass.
pub(crate) fn expand(template: &str, caps: &Captures<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['$', '\\']) {
        out.push_str(&rest[..pos]);
        let (consumed, text) = if rest[pos..].starts_with('$') {
            dollar(&rest[pos..], caps)
        } else {
            backslash(&rest[pos..], caps)
        };
        match text {
            Some(text) => out.push_str(text),
            None => out.push_str(&rest[pos..pos + consumed]),
        }
        rest = &rest[pos + consumed..];
    }
    out.push_str(rest);
    out
}

/// `s` starts with `$`. Returns bytes consumed and the replacement, or
/// `None` to copy the consumed bytes verbatim.
fn dollar<'h>(s: &str, caps: &Captures<'h>) -> (usize, Option<&'h str>) {
    let body = &s[1..];
    if body.starts_with('$') {
        return (2, Some("$"));
    }
    if let Some(braced) = body.strip_prefix('{') {
        if let Some(end) = braced.find('}') {
            let key = &braced[..end];
            if !key.is_empty() && key.chars().all(is_ident) {
                return (end + 3, group(caps, key));
            }
        }
        return (1, None);
    }
    let len = body.find(|c: char| !is_ident(c)).unwrap_or(body.len());
    if len == 0 {
        return (1, None);
    }
    (len + 1, group(caps, &body[..len]))
}

/// `s` starts with `\`.
fn backslash<'h>(s: &str, caps: &Captures<'h>) -> (usize, Option<&'h str>) {
    let body = &s[1..];
    let Some(next) = body.chars().next() else {
        return (1, None);
    };
    match next {
        '\\' => (2, Some("\\")),
        'n' => (2, Some("\n")),
        't' => (2, Some("\t")),
        'r' => (2, Some("\r")),
        '0'..='9' => {
            let len = body
                .bytes()
                .take(2)
                .take_while(u8::is_ascii_digit)
                .count();
            (len + 1, group(caps, &body[..len]))
        }
        'g' => {
            if let Some(inner) = body[1..].strip_prefix('<') {
                if let Some(end) = inner.find('>') {
                    let key = &inner[..end];
                    if !key.is_empty() && key.chars().all(is_ident) {
                        return (end + 4, group(caps, key));
                    }
                }
            }
            (1, None)
        }
        _ => (1, None),
    }
}
