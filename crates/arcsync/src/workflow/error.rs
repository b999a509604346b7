//! Step failure taxonomy.
//!
//! Classification decides what happens to the task: mapping errors stay
//! failed until configuration changes, everything else is eligible for
//! redelivery up to the retry ceiling.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StepError {
    /// Required collection-name or metadata mapping is absent. Not
    /// retryable until an administrator fixes the configuration.
    #[error("Missing mapping for key '{key}'")]
    Mapping { key: String },

    /// Unexpected system/runtime failure during a step.
    #[error("Workflow failure: {0}")]
    Workflow(String),

    /// Source file unreadable or missing.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// State store failure mid-step.
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

impl StepError {
    /// Whether redelivery may succeed without configuration changes.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StepError::Mapping { .. })
    }
}
