pub mod archive;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod notify;
pub mod processor;
pub mod queue;
pub mod workflow;

pub use archive::ArchiveClient;
pub use config::{load_config, Config, DocConfig};
pub use db::Database;
pub use error::{ConfigError, QueueError, Result, SyncError};
pub use metadata::MetadataRequest;
pub use notify::{LogNotifier, Notifier};
pub use processor::{DocProcessor, ProcessorRegistry};
pub use queue::{ConsumerPool, Producer, SyncOutcome, WorkRef};
pub use workflow::{StepError, WorkflowEngine};
