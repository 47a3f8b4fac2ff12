//! hbactl: inspect and safely edit PostgreSQL `pg_hba.conf`
//!
//! # Architecture
//!
//! The rule file is plain text where order decides which rule PostgreSQL
//! applies first. Reads go through [`parser`] and [`reader`]; comments,
//! blank lines and directives this crate does not model are skipped, never
//! rejected. Writes go through [`edit`], which recomputes its targets from
//! a fresh read, keeps every untouched line byte-for-byte and rewrites the
//! file in one pass.
//!
//! # Safety
//!
//! - [`edit::backup`] copies the file before any destructive write
//! - Appends never rewrite existing bytes
//! - Insert and remove rewrite atomically (tempfile + fsync + rename) and
//!   keep the file's permissions
//! - Line-number targets are validated as a whole before anything changes
//!
//! There is no locking: two invocations editing the same file at once can
//! race. The tool assumes one operator running one command at a time.
//!
//! # Example
//!
//! ```no_run
//! use hbactl::{edit, Rule};
//!
//! let rule = Rule {
//!     kind: "host".into(),
//!     database: "all".into(),
//!     user: "app".into(),
//!     address: "10.0.0.5/32".into(),
//!     netmask: String::new(),
//!     method: "scram-sha-256".into(),
//! };
//!
//! let path = "/etc/postgresql/16/main/pg_hba.conf";
//! let backup = edit::backup(path)?;
//! println!("backup at {}", backup.display());
//! edit::insert_rule_after_user(path, &rule, "app")?;
//! # Ok::<(), hbactl::HbaError>(())
//! ```

pub mod config;
pub mod edit;
pub mod error;
pub mod output;
pub mod parser;
pub mod pg;
pub mod reader;
pub mod rule;
pub mod select;
pub mod sort;

// Re-exports
pub use config::{ConfigError, Overrides, RunConfig, Settings};
pub use edit::{
    append_rule, backup, insert_rule_after_user, remove_line, remove_lines,
};
pub use error::HbaError;
pub use parser::parse_line;
pub use pg::{ClientError, HbaFileError, PgClient, ServerControl};
pub use reader::{parse_file, parse_file_with_line_numbers, read_bytes, read_text};
pub use rule::{ConnectionType, Rule, RuleWithLine};
pub use select::RemovalCriteria;
pub use sort::{sort_rules, sort_rules_with_line, valid_sort_column, SortColumn};
