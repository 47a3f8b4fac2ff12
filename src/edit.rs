//! Structure-preserving edits to pg_hba.conf.
//!
//! Each operation reads the current file, computes the new body from that
//! single snapshot and writes it back in one pass. Untouched lines keep
//! their exact bytes. Nothing here takes a backup; callers run [`backup`]
//! first and stop if it fails.

use crate::error::HbaError;
use crate::parser::parse_raw_line;
use crate::reader::read_bytes;
use crate::rule::Rule;
use chrono::Local;
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const BACKUP_TIMESTAMP: &str = "%Y%m%d-%H%M%S";

/// Copy `path` to `path.bak`, or to `path.bak.<YYYYMMDD-HHMMSS>` when the
/// plain name is taken. Returns the backup path.
///
/// Backup files are created exclusively, so an existing backup (or a
/// symlink squatting on its name) is never written through. The copy gets
/// the original's permission bits.
pub fn backup(path: impl AsRef<Path>) -> Result<PathBuf, HbaError> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|e| HbaError::io(path, e))?;
    let permissions = fs::metadata(path)
        .map_err(|e| HbaError::io(path, e))?
        .permissions();

    let stamp = Local::now().format(BACKUP_TIMESTAMP).to_string();
    let mut attempt = 0;
    loop {
        let candidate = backup_candidate(path, &stamp, attempt);
        attempt += 1;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(HbaError::io(&candidate, e)),
        };
        file.write_all(&data)
            .and_then(|()| file.sync_all())
            .map_err(|e| HbaError::io(&candidate, e))?;
        fs::set_permissions(&candidate, permissions.clone())
            .map_err(|e| HbaError::io(&candidate, e))?;

        info!(backup = %candidate.display(), bytes = data.len(), "backup written");
        return Ok(candidate);
    }
}

// .bak, then .bak.<stamp>, then .bak.<stamp>-N for several backups in one second.
fn backup_candidate(path: &Path, stamp: &str, attempt: usize) -> PathBuf {
    match attempt {
        0 => with_suffix(path, ".bak"),
        1 => with_suffix(path, &format!(".bak.{stamp}")),
        n => with_suffix(path, &format!(".bak.{stamp}-{}", n - 1)),
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Append `rule` at the end of the file without rewriting existing bytes.
///
/// A non-empty file gets a `\n` separator first, so the rule always starts
/// on its own line.
pub fn append_rule(path: impl AsRef<Path>, rule: &Rule) -> Result<(), HbaError> {
    let path = path.as_ref();
    let line = rule.line()?;

    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| HbaError::io(path, e))?;
    let size = file.metadata().map_err(|e| HbaError::io(path, e))?.len();

    let mut out = String::with_capacity(line.len() + 2);
    if size > 0 {
        out.push('\n');
    }
    out.push_str(&line);
    out.push('\n');

    file.write_all(out.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| HbaError::io(path, e))?;

    info!(path = %path.display(), line = %line, "rule appended");
    Ok(())
}

/// What [`append_rule`] would produce for `content`.
pub fn append_to_content(content: &[u8], line: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + line.len() + 2);
    out.extend_from_slice(content);
    if !content.is_empty() {
        out.push(b'\n');
    }
    out.extend_from_slice(line.as_bytes());
    out.push(b'\n');
    out
}

/// Insert `rule` right after the last rule whose user is exactly
/// `after_user`, or append it when there is none.
pub fn insert_rule_after_user(
    path: impl AsRef<Path>,
    rule: &Rule,
    after_user: &str,
) -> Result<(), HbaError> {
    let path = path.as_ref();
    let line = rule.line()?;
    let content = read_bytes(path)?;

    let updated = insert_after_user_in_content(&content, &line, after_user);
    atomic_write(path, &updated)?;

    info!(path = %path.display(), after_user, line = %line, "rule inserted");
    Ok(())
}

/// Byte form of [`insert_rule_after_user`]. Lines that are not valid UTF-8
/// are matched lossily and copied through unchanged.
pub fn insert_after_user_in_content(content: &[u8], line: &str, after_user: &str) -> Vec<u8> {
    let mut lines = split_lines(content);

    let last_match = if after_user.is_empty() {
        None
    } else {
        lines.iter().rposition(|raw| {
            parse_raw_line(&String::from_utf8_lossy(raw)).is_some_and(|r| r.user == after_user)
        })
    };

    match last_match {
        Some(pos) => {
            debug!(line_no = pos + 1, "inserting after last rule for user");
            lines.insert(pos + 1, line.as_bytes());
        }
        None => {
            debug!(after_user, "no rule for user, appending at end");
            if lines.last().is_some_and(|l| l.is_empty()) {
                lines.pop();
            }
            lines.push(line.as_bytes());
        }
    }

    join_lines(&lines)
}

pub fn remove_line(path: impl AsRef<Path>, line_no: usize) -> Result<(), HbaError> {
    remove_lines(path, &[line_no])
}

/// Remove the given 1-based physical lines in a single rewrite.
///
/// Line numbers must come from a fresh read of the same file. All of them
/// are checked before anything is written; one out-of-range number leaves
/// the file untouched.
pub fn remove_lines(path: impl AsRef<Path>, line_numbers: &[usize]) -> Result<(), HbaError> {
    let path = path.as_ref();
    if line_numbers.is_empty() {
        return Ok(());
    }

    let content = read_bytes(path)?;
    let updated = remove_lines_from_content(&content, line_numbers)?;
    atomic_write(path, &updated)?;

    info!(path = %path.display(), lines = ?line_numbers, "lines removed");
    Ok(())
}

/// Byte form of [`remove_lines`].
pub fn remove_lines_from_content(
    content: &[u8],
    line_numbers: &[usize],
) -> Result<Vec<u8>, HbaError> {
    let mut lines = if content.is_empty() {
        Vec::new()
    } else {
        split_lines(content)
    };
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    let total = lines.len();

    let targets: BTreeSet<usize> = line_numbers.iter().copied().collect();
    if let Some(&line) = targets.iter().find(|&&n| n < 1 || n > total) {
        return Err(HbaError::LineOutOfRange { line, total });
    }

    let kept: Vec<&[u8]> = lines
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !targets.contains(&(i + 1)))
        .map(|(_, l)| l)
        .collect();

    Ok(join_lines(&kept))
}

fn split_lines(content: &[u8]) -> Vec<&[u8]> {
    content.split(|&b| b == b'\n').collect()
}

// Join with '\n' and guarantee exactly one trailing newline is present.
fn join_lines(lines: &[&[u8]]) -> Vec<u8> {
    let mut out = lines.join(&b'\n');
    if out.last() != Some(&b'\n') {
        out.push(b'\n');
    }
    out
}

/// Atomic file write: tempfile in the same directory + fsync + rename.
///
/// The replacement keeps the original's permission bits, and on Unix its
/// owner and group when the process is allowed to set them. A symlinked
/// path is resolved first so the link itself survives.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), HbaError> {
    let resolved = fs::canonicalize(path).map_err(|e| HbaError::io(path, e))?;
    let path = resolved.as_path();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let original = fs::metadata(path).map_err(|e| HbaError::io(path, e))?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| HbaError::io(parent, e))?;
    temp.write_all(content)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| HbaError::io(temp.path(), e))?;
    fs::set_permissions(temp.path(), original.permissions())
        .map_err(|e| HbaError::io(temp.path(), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if let Err(e) =
            std::os::unix::fs::chown(temp.path(), Some(original.uid()), Some(original.gid()))
        {
            warn!(path = %path.display(), error = %e, "could not preserve file owner");
        }
    }

    temp.persist(path).map_err(|e| HbaError::io(path, e.error))?;
    Ok(())
}
