//! Engine error taxonomy
//!
//! Fatal conditions surface as a typed `EngineError`. Outcome-logging
//! failures never reach this type: the logger swallows them. "Nothing to do"
//! is data, not an error (see `session::SessionStart`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Store unreachable, schema setup failed, or required content is missing.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// A query against the learner-data store failed.
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("store lock poisoned: {0}")]
    Lock(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::InvalidArgument(format!("malformed JSON: {}", e))
    }
}
