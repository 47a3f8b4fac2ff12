//! Single-line parsing for pg_hba.conf.
//!
//! Lines are tokenized on unquoted whitespace and classified by their first
//! field. Anything that is not a `local` or `host*` rule yields `None`;
//! callers skip such lines instead of failing the whole file.

use crate::rule::{ConnectionType, Rule};

/// Truncate `line` at the first `#` that is not inside double quotes.
pub fn strip_comment(line: &str) -> &str {
    let mut in_quote = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quote = !in_quote,
            '#' if !in_quote => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Split on runs of spaces/tabs, keeping double-quoted segments together.
///
/// Quotes are dropped from the output; there is no escape syntax.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut buf = String::new();
    let mut in_quote = false;

    for c in line.chars() {
        match c {
            '"' => in_quote = !in_quote,
            _ if in_quote => buf.push(c),
            ' ' | '\t' => {
                if !buf.is_empty() {
                    fields.push(std::mem::take(&mut buf));
                }
            }
            _ => buf.push(c),
        }
    }
    if !buf.is_empty() {
        fields.push(buf);
    }
    fields
}

/// Syntactic check for a legacy netmask column (dotted IPv4 or hex IPv6).
///
/// Deliberately loose: a name containing `.` or `:` in this position is
/// classified as a netmask too.
pub fn looks_like_netmask(field: &str) -> bool {
    field.contains('.') || field.contains(':')
}

/// Parse one line that has already been trimmed and comment-stripped.
pub fn parse_line(line: &str) -> Option<Rule> {
    let fields = split_fields(line);
    if fields.len() < 4 {
        return None;
    }

    let kind = ConnectionType::from_keyword(&fields[0])?;

    if kind.is_local() {
        // local  DATABASE  USER  METHOD [OPTIONS]
        return Some(Rule {
            kind: kind.as_str().to_string(),
            database: fields[1].clone(),
            user: fields[2].clone(),
            address: "-".to_string(),
            netmask: String::new(),
            method: fields[3..].join(" "),
        });
    }

    // host*  DATABASE  USER  ADDRESS  METHOD [OPTIONS]
    // host*  DATABASE  USER  IP-ADDRESS  IP-MASK  METHOD [OPTIONS]
    if fields.len() < 5 {
        return None;
    }
    let (netmask, method_start) = if fields.len() >= 6 && looks_like_netmask(&fields[4]) {
        (fields[4].clone(), 5)
    } else {
        (String::new(), 4)
    };

    Some(Rule {
        kind: kind.as_str().to_string(),
        database: fields[1].clone(),
        user: fields[2].clone(),
        address: fields[3].clone(),
        netmask,
        method: fields[method_start..].join(" "),
    })
}

/// Strip the comment and surrounding whitespace from a raw line, then parse.
pub fn parse_raw_line(raw: &str) -> Option<Rule> {
    let line = strip_comment(raw.trim()).trim();
    if line.is_empty() {
        return None;
    }
    parse_line(line)
}
