//! Talking to the running PostgreSQL server.
//!
//! The server tells us where pg_hba.conf lives, reloads its configuration
//! on request and reports lines it failed to parse. None of this feeds the
//! edit path beyond the file location, and every call is bounded by a
//! deadline so a hung server never stalls a command before its write.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("could not connect to PostgreSQL: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("query failed ({query}): {source}")]
    Query {
        query: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("timed out after {}s waiting for the server", .0.as_secs())]
    Timeout(Duration),

    #[error("server reported an empty hba_file setting")]
    EmptyHbaPath,
}

/// A syntax error PostgreSQL reported for the active rule file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HbaFileError {
    pub line_number: Option<i32>,
    pub message: String,
}

/// Server-side operations the CLI depends on.
#[allow(async_fn_in_trait)]
pub trait ServerControl {
    /// Path of the rule file the server loaded.
    async fn hba_file_path(&self) -> Result<PathBuf, ClientError>;

    async fn reload_configuration(&self) -> Result<(), ClientError>;

    /// Lines of the active file the server could not parse, by line number.
    async fn fetch_parse_errors(&self) -> Result<Vec<HbaFileError>, ClientError>;
}

/// Ask the server for the rule file path, rejecting a blank answer.
pub async fn locate_rule_file<S: ServerControl>(server: &S) -> Result<PathBuf, ClientError> {
    let path = server.hba_file_path().await?;
    if path.as_os_str().is_empty() {
        return Err(ClientError::EmptyHbaPath);
    }
    debug!(path = %path.display(), "server reported hba_file");
    Ok(path)
}

const SHOW_HBA_FILE: &str = "SHOW hba_file";
const RELOAD_CONF: &str = "SELECT pg_reload_conf()";
const HBA_FILE_ERRORS: &str = "SELECT line_number, error FROM pg_hba_file_rules \
     WHERE error IS NOT NULL ORDER BY line_number";

pub struct PgClient {
    pool: PgPool,
    timeout: Duration,
}

impl PgClient {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let pool = deadline(
            timeout,
            PgPoolOptions::new()
                .max_connections(1)
                .acquire_timeout(timeout)
                .connect(url),
        )
        .await?
        .map_err(ClientError::Connect)?;
        Ok(Self { pool, timeout })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

impl ServerControl for PgClient {
    async fn hba_file_path(&self) -> Result<PathBuf, ClientError> {
        let path: String = deadline(
            self.timeout,
            sqlx::query_scalar(SHOW_HBA_FILE).fetch_one(&self.pool),
        )
        .await?
        .map_err(|source| ClientError::Query {
            query: SHOW_HBA_FILE,
            source,
        })?;
        Ok(PathBuf::from(path))
    }

    async fn reload_configuration(&self) -> Result<(), ClientError> {
        let reloaded: bool = deadline(
            self.timeout,
            sqlx::query_scalar(RELOAD_CONF).fetch_one(&self.pool),
        )
        .await?
        .map_err(|source| ClientError::Query {
            query: RELOAD_CONF,
            source,
        })?;
        debug!(reloaded, "pg_reload_conf");
        Ok(())
    }

    async fn fetch_parse_errors(&self) -> Result<Vec<HbaFileError>, ClientError> {
        let rows: Vec<(Option<i32>, Option<String>)> = deadline(
            self.timeout,
            sqlx::query_as(HBA_FILE_ERRORS).fetch_all(&self.pool),
        )
        .await?
        .map_err(|source| ClientError::Query {
            query: HBA_FILE_ERRORS,
            source,
        })?;

        Ok(rows
            .into_iter()
            .map(|(line_number, message)| HbaFileError {
                line_number,
                message: message.unwrap_or_default(),
            })
            .collect())
    }
}

async fn deadline<F: Future>(timeout: Duration, fut: F) -> Result<F::Output, ClientError> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ClientError::Timeout(timeout))
}
