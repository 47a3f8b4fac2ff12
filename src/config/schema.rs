use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Contents of `hbactl` config file. Every section is optional.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub file: FileSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSettings {
    #[serde(default)]
    pub url: Option<String>,
    /// Deadline for each server call, connect included
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    /// Explicit pg_hba.conf path; skips asking the server
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OutputSettings {
    #[serde(default = "default_color")]
    pub color: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self { color: true }
    }
}

fn default_color() -> bool {
    true
}

impl Settings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.connection.timeout_secs == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "connection.timeout_secs",
                message: "must be at least 1".to_string(),
            });
        }
        if matches!(&self.connection.url, Some(url) if url.trim().is_empty()) {
            issues.push(ValidationIssue::Empty {
                field: "connection.url",
            });
        }
        if matches!(&self.file.path, Some(path) if path.as_os_str().is_empty()) {
            issues.push(ValidationIssue::Empty { field: "file.path" });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    Empty { field: &'static str },
    OutOfRange { field: &'static str, message: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::Empty { field } => write!(f, "'{field}' must not be empty"),
            ValidationIssue::OutOfRange { field, message } => write!(f, "'{field}' {message}"),
        }
    }
}
