use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Workflow step failed: {0}")]
    Step(#[from] crate::workflow::StepError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid doc entry '{doc}': {reason}")]
    InvalidDoc { doc: String, reason: String },
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Work queue closed unexpectedly")]
    ChannelClosed,

    #[error("Failed to spawn consumer: {0}")]
    SpawnFailed(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
