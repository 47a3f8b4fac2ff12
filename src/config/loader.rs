use crate::config::schema::{Settings, ValidationError};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "HBACTL_CONFIG";

/// Every variant names the file it came from.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML ({})", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml_edit::de::Error,
    },
    #[error("invalid config ({})", path.display())]
    Validation {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },
}

/// Parse and validate settings text; `origin` is only used in errors.
pub fn load_from_str(input: &str, origin: &Path) -> Result<Settings, ConfigError> {
    let settings: Settings = toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml {
        path: origin.to_path_buf(),
        source,
    })?;
    settings.validate().map_err(|source| ConfigError::Validation {
        path: origin.to_path_buf(),
        source,
    })?;
    Ok(settings)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents, path)
}

/// Load settings from the first config file found.
///
/// Lookup order:
/// 1. `explicit` (the `--config` flag); must exist.
/// 2. `$HBACTL_CONFIG`; must exist.
/// 3. `~/.config/hbactl/config.toml`, only if present.
///
/// No file at all yields the defaults.
pub fn discover(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
    if let Some(path) = explicit {
        return load_from_path(path);
    }

    if let Some(path) = env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return load_from_path(PathBuf::from(path));
    }

    if let Some(home) = home::home_dir() {
        let path = home.join(".config").join("hbactl").join("config.toml");
        if path.is_file() {
            debug!(path = %path.display(), "loading user config");
            return load_from_path(&path);
        }
    }

    Ok(Settings::default())
}
