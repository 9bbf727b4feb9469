//! `key=value` properties codec for settings store files.
//!
//! One entry per line, `=` or `:` as separator, `#` and `!` comment lines.
//! Backslash escapes cover `\\`, `\n`, `\t`, `\r`, `\f`, and any
//! separator, comment or space character that must be taken literally. Only
//! space, tab and form feed count as blank for trimming. Line continuations
//! are not supported.

use crate::{Settings, StoreError};

/// Decode a properties document. Later duplicates of a key win.
pub fn parse(store_id: &str, input: &str) -> Result<Settings, StoreError> {
    let mut settings = Settings::new();

    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        let stripped = line.trim_start_matches(is_blank);
        if stripped.is_empty() || stripped.starts_with('#') || stripped.starts_with('!') {
            continue;
        }

        let malformed = |reason: &str| StoreError::Malformed {
            id: store_id.to_owned(),
            line: line_no,
            reason: reason.to_owned(),
        };

        let Some(split) = separator_index(stripped) else {
            return Err(malformed("missing '=' separator"));
        };

        let key = unescape(&stripped[..split]).ok_or_else(|| malformed("dangling escape"))?;
        let value =
            unescape(&stripped[split + 1..]).ok_or_else(|| malformed("dangling escape"))?;

        let key = collect(trim_end(trim_start(&key)));
        if key.is_empty() {
            return Err(malformed("empty key"));
        }
        settings.insert(key, collect(trim_start(&value)));
    }

    Ok(settings)
}

/// Encode settings as a properties document, one sorted entry per line.
pub fn render(settings: &Settings) -> String {
    let mut out = String::new();
    for (key, value) in settings {
        escape_into(&mut out, key, true);
        out.push('=');
        escape_into(&mut out, value, false);
        out.push('\n');
    }
    out
}

fn separator_index(line: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '=' || c == ':' {
            return Some(i);
        }
    }
    None
}

/// Decoded characters, each flagged with whether it came from an escape.
/// Escaped whitespace survives trimming.
fn unescape(raw: &str) -> Option<Vec<(char, bool)>> {
    let mut out = Vec::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push((c, false));
            continue;
        }
        let decoded = match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'f' => '\x0c',
            other => other,
        };
        out.push((decoded, true));
    }
    Some(out)
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

fn trim_start(chars: &[(char, bool)]) -> &[(char, bool)] {
    let start = chars
        .iter()
        .position(|&(c, escaped)| escaped || !is_blank(c))
        .unwrap_or(chars.len());
    &chars[start..]
}

fn trim_end(chars: &[(char, bool)]) -> &[(char, bool)] {
    let end = chars
        .iter()
        .rposition(|&(c, escaped)| escaped || !is_blank(c))
        .map_or(0, |i| i + 1);
    &chars[..end]
}

fn collect(chars: &[(char, bool)]) -> String {
    chars.iter().map(|&(c, _)| c).collect()
}

fn escape_into(out: &mut String, text: &str, is_key: bool) {
    for (i, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' | ' ' if is_key => {
                out.push('\\');
                out.push(c);
            }
            ' ' if i == 0 => out.push_str("\\ "),
            _ => out.push(c),
        }
    }
}
