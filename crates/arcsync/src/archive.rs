//! Boundary to the archive's upload/registration protocol client.
//!
//! The engine only depends on this trait; the real transport lives in an
//! embedding application. Implementations must be idempotent per target
//! path, since a crash between a side effect and its checkpoint makes the
//! engine re-execute the step.

use std::path::Path;

use crate::metadata::MetadataRequest;
use crate::workflow::StepError;

pub trait ArchiveClient: Send + Sync {
    /// Uploads the packaged source file to the archive path. Returns the
    /// upload receipt (typically the generated upload URL).
    fn upload(&self, source: &Path, archive_path: &str) -> Result<String, StepError>;

    /// Registers the object and its parent-collection metadata.
    fn register(&self, archive_path: &str, request: &MetadataRequest) -> Result<(), StepError>;

    /// Creates the access bookmark for a destination collection.
    fn create_bookmark(&self, collection_path: &str) -> Result<(), StepError>;
}
