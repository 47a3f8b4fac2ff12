pub mod loader;
pub mod runtime;
pub mod schema;

pub use loader::{discover, load_from_path, load_from_str, ConfigError, CONFIG_ENV};
pub use runtime::{Overrides, RunConfig};
pub use schema::{
    ConnectionSettings, FileSettings, OutputSettings, Settings, ValidationError, ValidationIssue,
};
