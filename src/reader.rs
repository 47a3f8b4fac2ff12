use crate::error::HbaError;
use crate::parser::parse_raw_line;
use crate::rule::{Rule, RuleWithLine};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Read `path` and return its rules in file order.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<Rule>, HbaError> {
    let content = read_text(path.as_ref())?;
    Ok(parse_str(&content))
}

/// Read `path` and return its rules tagged with index and physical line.
pub fn parse_file_with_line_numbers(
    path: impl AsRef<Path>,
) -> Result<Vec<RuleWithLine>, HbaError> {
    let content = read_text(path.as_ref())?;
    Ok(parse_str_with_line_numbers(&content))
}

pub fn parse_str(content: &str) -> Vec<Rule> {
    parse_str_with_line_numbers(content)
        .into_iter()
        .map(|r| r.rule)
        .collect()
}

/// Comments, blanks and unrecognized lines consume a line number but no
/// index.
pub fn parse_str_with_line_numbers(content: &str) -> Vec<RuleWithLine> {
    let mut rules = Vec::new();
    for (i, raw) in content.lines().enumerate() {
        let line_no = i + 1;
        match parse_raw_line(raw) {
            Some(rule) => rules.push(RuleWithLine {
                index: rules.len() + 1,
                line_no,
                rule,
            }),
            None => {
                if !raw.trim().is_empty() && !raw.trim_start().starts_with('#') {
                    debug!(line_no, "skipping unrecognized line");
                }
            }
        }
    }
    rules
}

/// Raw file bytes. Rewrites work on these so foreign encodings survive.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>, HbaError> {
    fs::read(path).map_err(|e| HbaError::io(path, e))
}

/// File text for parsing and display; invalid UTF-8 becomes U+FFFD.
pub fn read_text(path: &Path) -> Result<String, HbaError> {
    let bytes = read_bytes(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: &str = "\
# TYPE  DATABASE        USER            ADDRESS                 METHOD
local   all             all                                     trust

host    all             all             127.0.0.1/32            scram-sha-256
host    all             all             ::1/128                 scram-sha-256
# comment line
include_dir conf.d
host    mydb            app             192.168.1.0 255.255.255.0   md5
";

    #[test]
    fn test_parse_str_mixed() {
        let rules = parse_str(MIXED);
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].kind, "local");
        assert_eq!(rules[0].address, "-");
        assert_eq!(rules[1].address, "127.0.0.1/32");
        assert_eq!(rules[2].address, "::1/128");
        assert_eq!(rules[3].address, "192.168.1.0");
        assert_eq!(rules[3].netmask, "255.255.255.0");
        assert_eq!(rules[3].method, "md5");
    }

    #[test]
    fn test_line_numbers_and_indices() {
        let rules = parse_str_with_line_numbers(MIXED);
        let positions: Vec<(usize, usize)> =
            rules.iter().map(|r| (r.index, r.line_no)).collect();
        assert_eq!(positions, vec![(1, 2), (2, 4), (3, 5), (4, 8)]);
    }

    #[test]
    fn test_parse_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_file(dir.path().join("nope.conf")).unwrap_err();
        assert!(matches!(err, HbaError::Io { .. }));
    }

    #[test]
    fn test_parse_file_latin1_comment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pg_hba.conf");
        fs::write(&path, b"# Configuraci\xf3n\nlocal all all peer\nhost all app 10.0.0.1/32 md5\n")
            .unwrap();

        let rules = parse_file_with_line_numbers(&path).unwrap();
        let positions: Vec<(usize, usize)> =
            rules.iter().map(|r| (r.index, r.line_no)).collect();
        assert_eq!(positions, vec![(1, 2), (2, 3)]);
        assert_eq!(rules[1].rule.user, "app");
    }

    #[test]
    fn test_parse_file_only_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pg_hba.conf");
        fs::write(&path, "\n# only comments\n# TYPE DATABASE USER METHOD\n\nlocal all all trust\n")
            .unwrap();
        let rules = parse_file(&path).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].method, "trust");
    }
}
