use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HbaError {
    #[error("permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid rule type {0:?}; use one of: local, host, hostssl, hostnossl, hostgssenc, hostnogssenc")]
    InvalidRuleType(String),

    #[error("line {line} out of range (file has {total} line(s))")]
    LineOutOfRange { line: usize, total: usize },

    #[error("no rule at index {index} (file has {total} rule(s))")]
    NoRuleAtIndex { index: usize, total: usize },

    #[error("no rules matching {criteria}")]
    NoMatchingRules { criteria: String },

    #[error("invalid criteria: {0}")]
    InvalidCriteria(String),

    #[error("invalid sort column {0:?}; use one of: type, database, user, address, method")]
    InvalidSortColumn(String),
}

impl HbaError {
    /// Wrap an I/O error, splitting out permission failures.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == io::ErrorKind::PermissionDenied {
            HbaError::PermissionDenied { path }
        } else {
            HbaError::Io { path, source }
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, HbaError::PermissionDenied { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_is_split_out() {
        let err = HbaError::io(
            "/etc/pg_hba.conf",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(err.is_permission_denied());
        assert_eq!(err.to_string(), "permission denied: /etc/pg_hba.conf");
    }

    #[test]
    fn test_other_io_errors_keep_source() {
        let err = HbaError::io("missing.conf", io::Error::from(io::ErrorKind::NotFound));
        assert!(!err.is_permission_denied());
        assert!(matches!(err, HbaError::Io { .. }));
    }
}
