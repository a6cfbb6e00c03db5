//! Literal extraction over JavaScript config sources.
//!
//! Config modules (`babel.config.js`, `jest.config.js`, `metro.config.js`)
//! are never executed. Instead the option shapes we care about are located
//! textually: `key: { ... }`, `key: [ ... ]` and `key: '...'`. Anything
//! computed at runtime is simply not seen.

use regex::Regex;

/// Strip `//` line and `/* */` block comments while leaving quoted strings intact.
pub(crate) fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' | '\'' | '`' => {
                out.push(ch);
                while let Some(c) = chars.next() {
                    out.push(c);
                    if c == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if c == ch {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            _ => out.push(ch),
        }
    }

    out
}

/// Byte offset just past `key:` (the key may be quoted), or `None`.
fn value_start(text: &str, key: &str) -> Option<usize> {
    let pattern = format!(
        r#"(?:^|[^\w$.])['"]?{}['"]?\s*:\s*"#,
        regex::escape(key)
    );
    let re = Regex::new(&pattern).ok()?;
    re.find(text).map(|m| m.end())
}

/// Inner text of the balanced `open ... close` block starting at `start`.
fn balanced(text: &str, start: usize, open: char, close: char) -> Option<&str> {
    let rest = text.get(start..)?;
    if !rest.starts_with(open) {
        return None;
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in rest.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return rest.get(open.len_utf8()..i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Body of `key: { ... }`.
pub(crate) fn object_body<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let start = value_start(text, key)?;
    balanced(text, start, '{', '}')
}

/// Body of `key: [ ... ]`.
pub(crate) fn array_body<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let start = value_start(text, key)?;
    balanced(text, start, '[', ']')
}

/// Value of `key: '...'`.
pub(crate) fn string_value(text: &str, key: &str) -> Option<String> {
    let start = value_start(text, key)?;
    let rest = text.get(start..)?;
    let first = rest.chars().next()?;
    if !matches!(first, '"' | '\'' | '`') {
        return None;
    }
    literal_strings(rest).into_iter().next()
}

/// Split on commas that are outside brackets and quotes.
pub(crate) fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut last = 0;

    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(body[last..i].trim());
                last = i + 1;
            }
            _ => {}
        }
    }
    parts.push(body[last..].trim());
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

/// `key: value` entries of an object body, keys unquoted, values raw.
pub(crate) fn object_entries(body: &str) -> Vec<(String, String)> {
    split_top_level(body)
        .into_iter()
        .filter_map(|entry| {
            let colon = key_colon(entry)?;
            let key = unquote(entry[..colon].trim());
            let value = entry[colon + 1..].trim().to_string();
            if key.is_empty() {
                None
            } else {
                Some((key, value))
            }
        })
        .collect()
}

/// Position of the first `:` outside quotes.
fn key_colon(entry: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in entry.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            ':' => return Some(i),
            _ => {}
        }
    }
    None
}

/// Every quoted string literal in `text`, unescaped, in order.
pub(crate) fn literal_strings(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if !matches!(c, '"' | '\'' | '`') {
            continue;
        }
        let mut value = String::new();
        let mut closed = false;
        while let Some(n) = chars.next() {
            if n == '\\' {
                if let Some(escaped) = chars.next() {
                    value.push(escaped);
                }
            } else if n == c {
                closed = true;
                break;
            } else {
                value.push(n);
            }
        }
        if closed {
            out.push(value);
        }
    }
    out
}

/// Unquote a key that may be a bare identifier or a string literal.
pub(crate) fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    literal_strings(trimmed)
        .into_iter()
        .next()
        .filter(|_| matches!(trimmed.chars().next(), Some('"' | '\'' | '`')))
        .unwrap_or_else(|| trimmed.to_string())
}

/// A value expression that is exactly one string literal.
pub(crate) fn single_literal(expr: &str) -> Option<String> {
    let trimmed = expr.trim();
    if !matches!(trimmed.chars().next(), Some('"' | '\'' | '`')) {
        return None;
    }
    let strings = literal_strings(trimmed);
    match strings.as_slice() {
        [only] => Some(only.clone()),
        _ => None,
    }
}
