//! Rendering rules and previews for the terminal.

use crate::rule::RuleWithLine;
use crate::sort::SortColumn;
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::io::{self, Write};
use std::path::Path;

const HEADERS: [&str; 7] = ["#", "LINE", "TYPE", "DATABASE", "USER", "ADDRESS", "METHOD"];

fn row(rule: &RuleWithLine) -> [String; 7] {
    let r = &rule.rule;
    let address = if r.netmask.is_empty() {
        r.address.clone()
    } else {
        format!("{} / {}", r.address, r.netmask)
    };
    [
        rule.index.to_string(),
        rule.line_no.to_string(),
        r.kind.clone(),
        r.database.clone(),
        r.user.clone(),
        address,
        r.method.clone(),
    ]
}

/// Aligned table with a header, even when `rules` is empty.
pub fn write_rules_table<W: Write>(w: &mut W, rules: &[RuleWithLine]) -> io::Result<()> {
    let rows: Vec<[String; 7]> = rules.iter().map(row).collect();

    let mut widths = HEADERS.map(str::len);
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header: Vec<String> = HEADERS
        .iter()
        .zip(widths)
        .map(|(h, width)| format!("{h:<width$}"))
        .collect();
    writeln!(w, "{}", header.join("  ").trim_end().bold())?;

    let dashes: Vec<String> = HEADERS
        .iter()
        .zip(widths)
        .map(|(h, width)| format!("{:<width$}", "-".repeat(h.len())))
        .collect();
    writeln!(w, "{}", dashes.join("  ").trim_end())?;

    for cells in &rows {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        writeln!(w, "{}", line.join("  ").trim_end())?;
    }
    Ok(())
}

/// One table per distinct value of `column`, in order of first appearance.
pub fn write_grouped<W: Write>(
    w: &mut W,
    rules: &[RuleWithLine],
    column: SortColumn,
) -> io::Result<()> {
    let mut groups: Vec<(&str, Vec<RuleWithLine>)> = Vec::new();
    for rule in rules {
        let key = column.key(&rule.rule);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(rule.clone()),
            None => groups.push((key, vec![rule.clone()])),
        }
    }

    for (i, (key, members)) in groups.iter().enumerate() {
        if i > 0 {
            writeln!(w)?;
        }
        writeln!(
            w,
            "{} ({} rule(s))",
            format!("{column}: {key}").cyan().bold(),
            members.len()
        )?;
        write_rules_table(w, members)?;
    }
    Ok(())
}

pub fn write_json<W: Write>(w: &mut W, rules: &[RuleWithLine]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *w, rules)?;
    writeln!(w)
}

/// Unified line diff between the current and the would-be file body.
pub fn write_diff<W: Write>(w: &mut W, path: &Path, before: &str, after: &str) -> io::Result<()> {
    writeln!(w, "{}", format!("--- {} (current)", path.display()).dimmed())?;
    writeln!(w, "{}", format!("+++ {} (proposed)", path.display()).dimmed())?;

    let diff = TextDiff::from_lines(before, after);
    for change in diff.iter_all_changes() {
        let text = match change.tag() {
            ChangeTag::Delete => format!("-{change}").red(),
            ChangeTag::Insert => format!("+{change}").green(),
            ChangeTag::Equal => format!(" {change}").normal(),
        };
        write!(w, "{text}")?;
        if change.missing_newline() {
            writeln!(w)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::parse_str_with_line_numbers;

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    const FILE: &str = "\
local all all trust
host all all 127.0.0.1/32 scram-sha-256
host all app 10.0.0.0 255.0.0.0 md5
";

    #[test]
    fn test_table_contents() {
        let rules = parse_str_with_line_numbers(FILE);
        let out = render(|w| write_rules_table(w, &rules));
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("#  LINE  TYPE"));
        assert!(lines[0].contains("DATABASE") && lines[0].contains("METHOD"));
        assert!(lines[2].contains("local") && lines[2].contains("trust"));
        assert!(out.contains("127.0.0.1/32"));
        assert!(out.contains("10.0.0.0 / 255.0.0.0"));
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_empty_table_has_header() {
        let out = render(|w| write_rules_table(w, &[]));
        assert!(out.contains("TYPE"));
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn test_grouped_by_user() {
        let rules = parse_str_with_line_numbers(FILE);
        let out = render(|w| write_grouped(w, &rules, SortColumn::User));
        assert!(out.contains("user: all (2 rule(s))"));
        assert!(out.contains("user: app (1 rule(s))"));
        assert!(out.find("user: all").unwrap() < out.find("user: app").unwrap());
    }

    #[test]
    fn test_json_fields() {
        let rules = parse_str_with_line_numbers(FILE);
        let out = render(|w| write_json(w, &rules));
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["type"], "local");
        assert_eq!(value[2]["netmask"], "255.0.0.0");
        assert_eq!(value[2]["line_no"], 3);
        assert_eq!(value[2]["index"], 3);
    }

    #[test]
    fn test_diff_marks_changes() {
        let out = render(|w| write_diff(w, Path::new("pg_hba.conf"), "a\nb\n", "a\nc\n"));
        assert!(out.contains("-b\n"));
        assert!(out.contains("+c\n"));
        assert!(out.contains(" a\n"));
    }
}
