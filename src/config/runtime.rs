use crate::config::schema::Settings;
use std::path::PathBuf;
use std::time::Duration;

/// Values given on the command line; `None` defers to the environment and
/// the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub conn: Option<String>,
    pub file: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub no_color: bool,
}

/// Effective settings for one invocation, passed to every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub conn: Option<String>,
    pub file: Option<PathBuf>,
    pub timeout: Duration,
    pub color: bool,
}

impl Settings {
    /// Merge flags > `DATABASE_URL` > config file > defaults.
    ///
    /// `database_url` is the value of `DATABASE_URL`, passed in rather than
    /// read here.
    pub fn resolve(&self, overrides: &Overrides, database_url: Option<String>) -> RunConfig {
        let conn = non_empty(overrides.conn.clone())
            .or_else(|| non_empty(database_url))
            .or_else(|| non_empty(self.connection.url.clone()));

        let file = overrides
            .file
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| self.file.path.clone());

        let timeout_secs = overrides
            .timeout_secs
            .filter(|&secs| secs > 0)
            .unwrap_or(self.connection.timeout_secs);

        RunConfig {
            conn,
            file,
            timeout: Duration::from_secs(timeout_secs),
            color: self.output.color && !overrides.no_color,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;
    use std::path::Path;

    fn settings() -> Settings {
        load_from_str(
            "[connection]\nurl = \"postgres://from-file\"\ntimeout_secs = 4\n[file]\npath = \"/from/file\"\n",
            Path::new("config.toml"),
        )
        .unwrap()
    }

    #[test]
    fn test_flags_win() {
        let overrides = Overrides {
            conn: Some("postgres://from-flag".into()),
            file: Some(PathBuf::from("/from/flag")),
            timeout_secs: Some(2),
            no_color: true,
        };
        let run = settings().resolve(&overrides, Some("postgres://from-env".into()));
        assert_eq!(run.conn.as_deref(), Some("postgres://from-flag"));
        assert_eq!(run.file, Some(PathBuf::from("/from/flag")));
        assert_eq!(run.timeout, Duration::from_secs(2));
        assert!(!run.color);
    }

    #[test]
    fn test_env_beats_file_for_connection() {
        let run = settings().resolve(&Overrides::default(), Some("postgres://from-env".into()));
        assert_eq!(run.conn.as_deref(), Some("postgres://from-env"));
        assert_eq!(run.file, Some(PathBuf::from("/from/file")));
        assert_eq!(run.timeout, Duration::from_secs(4));
        assert!(run.color);
    }

    #[test]
    fn test_blank_values_fall_through() {
        let overrides = Overrides {
            conn: Some("  ".into()),
            ..Overrides::default()
        };
        let run = settings().resolve(&overrides, Some(String::new()));
        assert_eq!(run.conn.as_deref(), Some("postgres://from-file"));
    }

    #[test]
    fn test_defaults_without_any_source() {
        let run = Settings::default().resolve(&Overrides::default(), None);
        assert_eq!(run.conn, None);
        assert_eq!(run.file, None);
        assert_eq!(run.timeout, Duration::from_secs(10));
    }
}
