//! Installation error types
//!
//! Every component returns its own typed failure. The orchestrator folds them
//! into [`InstallError`] and reports them as plain messages; none of them is
//! fatal to the process.

use std::path::PathBuf;
use thiserror::Error;

/// Store-level failure reported by a connection.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("{0}")]
    Backend(String),
}

/// The connection factory could not hand out a connection.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Database is unreachable: {0}")]
    Unavailable(String),
}

impl From<deadpool_postgres::PoolError> for ConnectionError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        ConnectionError::Unavailable(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema source {path} could not be read: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema source contains no statements")]
    Empty,

    /// `index` is 1-based. The statement text is deliberately not carried.
    #[error("Schema statement {index} of {total} failed: {source}")]
    Statement {
        index: usize,
        total: usize,
        #[source]
        source: StoreError,
    },
}

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Invalid administrator details: {0}")]
    Invalid(String),

    #[error("Failed to hash administrator password: {0}")]
    Hash(String),

    #[error("Failed to create administrator account: {0}")]
    Insert(#[source] StoreError),
}

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Failed to count existing step templates: {0}")]
    Count(#[source] StoreError),

    #[error("Failed to insert step templates: {0}")]
    Insert(#[source] StoreError),
}

/// Failure of a single stage action.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("System requirements are not met.")]
    RequirementsNotMet,

    #[error("Action '{action}' does not belong to stage {stage}.")]
    WrongStage { action: &'static str, stage: u8 },

    #[error("Installation is already complete.")]
    AlreadyComplete,

    #[error("Another installation step is already in progress.")]
    InProgress,

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Seed(#[from] SeedError),
}
