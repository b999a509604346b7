//! The fixed step sequence.
//!
//! Each step either executes its side effect and returns a recorded value
//! for checkpointing, or rehydrates the context from a previous attempt's
//! recorded value when its checkpoint already exists. `rerun_on_retry`
//! marks steps whose checkpoints are cleared when an attempt fails:
//! durable effects (upload, permission bookmark) keep theirs so a retry
//! does not repeat expensive or non-idempotent external work.

use std::path::Path;
use std::sync::Arc;

use crate::archive::ArchiveClient;
use crate::db::{bookmark_repo, Database};
use crate::metadata::MetadataRequest;
use crate::processor::ProcessorRegistry;

use super::context::WorkflowContext;
use super::error::StepError;

pub trait WorkflowStep: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether a failed attempt clears this step's checkpoint.
    fn rerun_on_retry(&self) -> bool {
        true
    }

    /// Runs the step's side effect. The returned string is persisted as
    /// the checkpoint value.
    fn execute(&self, db: &Database, ctx: &mut WorkflowContext) -> Result<String, StepError>;

    /// Rehydrates the context from a checkpoint recorded by an earlier
    /// attempt, instead of re-executing the side effect.
    fn resume(&self, _ctx: &mut WorkflowContext, _recorded: &str) -> Result<(), StepError> {
        Ok(())
    }
}

/// Step names in execution order. The order is fixed and must be respected.
pub fn step_names() -> [&'static str; 5] {
    [
        "compute_archive_path",
        "build_metadata",
        "upload_file",
        "register_metadata",
        "permission_bookmark",
    ]
}

fn required_archive_path(ctx: &WorkflowContext) -> Result<&str, StepError> {
    ctx.archive_path
        .as_deref()
        .ok_or_else(|| StepError::Workflow("Archive path not computed yet".to_string()))
}

// Step 1: archive path

pub struct ComputeArchivePathStep {
    registry: Arc<ProcessorRegistry>,
}

impl ComputeArchivePathStep {
    pub fn new(registry: Arc<ProcessorRegistry>) -> Self {
        Self { registry }
    }
}

impl WorkflowStep for ComputeArchivePathStep {
    fn name(&self) -> &'static str {
        "compute_archive_path"
    }

    fn execute(&self, db: &Database, ctx: &mut WorkflowContext) -> Result<String, StepError> {
        let processor = self.registry.resolve(&ctx.status.doc);
        let path = processor.compute_archive_path(db, &ctx.status)?;
        ctx.archive_path = Some(path.clone());
        Ok(path)
    }

    fn resume(&self, ctx: &mut WorkflowContext, recorded: &str) -> Result<(), StepError> {
        ctx.archive_path = Some(recorded.to_string());
        Ok(())
    }
}

// Step 2: metadata construction

pub struct BuildMetadataStep {
    registry: Arc<ProcessorRegistry>,
}

impl BuildMetadataStep {
    pub fn new(registry: Arc<ProcessorRegistry>) -> Self {
        Self { registry }
    }
}

impl WorkflowStep for BuildMetadataStep {
    fn name(&self) -> &'static str {
        "build_metadata"
    }

    fn execute(&self, db: &Database, ctx: &mut WorkflowContext) -> Result<String, StepError> {
        let processor = self.registry.resolve(&ctx.status.doc);
        let request = processor.build_metadata_request(db, &ctx.status)?;
        let recorded = serde_json::to_string(&request)
            .map_err(|e| StepError::Workflow(format!("Failed to encode metadata: {}", e)))?;
        ctx.metadata = Some(request);
        Ok(recorded)
    }

    fn resume(&self, ctx: &mut WorkflowContext, recorded: &str) -> Result<(), StepError> {
        let request: MetadataRequest = serde_json::from_str(recorded)
            .map_err(|e| StepError::Workflow(format!("Corrupt metadata checkpoint: {}", e)))?;
        ctx.metadata = Some(request);
        Ok(())
    }
}

// Step 3: upload (durable)

pub struct UploadStep {
    client: Arc<dyn ArchiveClient>,
}

impl UploadStep {
    pub fn new(client: Arc<dyn ArchiveClient>) -> Self {
        Self { client }
    }
}

impl WorkflowStep for UploadStep {
    fn name(&self) -> &'static str {
        "upload_file"
    }

    fn rerun_on_retry(&self) -> bool {
        // Uploaded content stays in the archive; a retry must not repeat it.
        false
    }

    fn execute(&self, _db: &Database, ctx: &mut WorkflowContext) -> Result<String, StepError> {
        let archive_path = required_archive_path(ctx)?.to_string();
        let url = self
            .client
            .upload(Path::new(&ctx.status.source_file_path), &archive_path)?;
        ctx.upload_url = Some(url.clone());
        Ok(url)
    }

    fn resume(&self, ctx: &mut WorkflowContext, recorded: &str) -> Result<(), StepError> {
        ctx.upload_url = Some(recorded.to_string());
        Ok(())
    }
}

// Step 4: registration

pub struct RegisterStep {
    client: Arc<dyn ArchiveClient>,
}

impl RegisterStep {
    pub fn new(client: Arc<dyn ArchiveClient>) -> Self {
        Self { client }
    }
}

impl WorkflowStep for RegisterStep {
    fn name(&self) -> &'static str {
        "register_metadata"
    }

    fn execute(&self, _db: &Database, ctx: &mut WorkflowContext) -> Result<String, StepError> {
        let archive_path = required_archive_path(ctx)?.to_string();
        let request = ctx
            .metadata
            .as_ref()
            .ok_or_else(|| StepError::Workflow("Metadata not built yet".to_string()))?;
        self.client.register(&archive_path, request)?;
        Ok("registered".to_string())
    }
}

// Step 5: permission bookmark (durable)

pub struct PermissionBookmarkStep {
    client: Arc<dyn ArchiveClient>,
}

impl PermissionBookmarkStep {
    pub fn new(client: Arc<dyn ArchiveClient>) -> Self {
        Self { client }
    }
}

impl WorkflowStep for PermissionBookmarkStep {
    fn name(&self) -> &'static str {
        "permission_bookmark"
    }

    fn rerun_on_retry(&self) -> bool {
        // Permission grants must not be re-issued.
        false
    }

    fn execute(&self, db: &Database, ctx: &mut WorkflowContext) -> Result<String, StepError> {
        let archive_path = required_archive_path(ctx)?;
        let collection_path = archive_path
            .rsplit_once('/')
            .map(|(parent, _)| parent)
            .unwrap_or(archive_path)
            .to_string();

        if !bookmark_repo::is_created(db, &collection_path)? {
            self.client.create_bookmark(&collection_path)?;
            bookmark_repo::mark_created(db, &collection_path)?;
        }

        Ok(collection_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StatusInfo;
    use crate::processor::DefaultProcessor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClient {
        uploads: AtomicUsize,
        bookmarks: AtomicUsize,
    }

    impl CountingClient {
        fn new() -> Self {
            Self {
                uploads: AtomicUsize::new(0),
                bookmarks: AtomicUsize::new(0),
            }
        }
    }

    impl ArchiveClient for CountingClient {
        fn upload(&self, _source: &Path, archive_path: &str) -> Result<String, StepError> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(format!("https://archive/upload{}", archive_path))
        }

        fn register(
            &self,
            _archive_path: &str,
            _request: &MetadataRequest,
        ) -> Result<(), StepError> {
            Ok(())
        }

        fn create_bookmark(&self, _collection_path: &str) -> Result<(), StepError> {
            self.bookmarks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn ctx() -> WorkflowContext {
        let mut status = StatusInfo::new("lcb", "r", "/data/Livlab/x", "/work/x.tar");
        status.id = 1;
        WorkflowContext::new(status)
    }

    #[test]
    fn test_step_names_fixed_order() {
        assert_eq!(
            step_names(),
            [
                "compute_archive_path",
                "build_metadata",
                "upload_file",
                "register_metadata",
                "permission_bookmark",
            ]
        );
    }

    #[test]
    fn test_compute_step_resume_rehydrates_path() {
        let registry = Arc::new(ProcessorRegistry::new(Arc::new(DefaultProcessor::new("/A"))));
        let step = ComputeArchivePathStep::new(registry);

        let mut ctx = ctx();
        step.resume(&mut ctx, "/A/lcb/x.tar").unwrap();
        assert_eq!(ctx.archive_path.as_deref(), Some("/A/lcb/x.tar"));
    }

    #[test]
    fn test_metadata_step_resume_parses_checkpoint() {
        let registry = Arc::new(ProcessorRegistry::new(Arc::new(DefaultProcessor::new("/A"))));
        let step = BuildMetadataStep::new(registry);

        let recorded = serde_json::to_string(&MetadataRequest::default()).unwrap();
        let mut ctx = ctx();
        step.resume(&mut ctx, &recorded).unwrap();
        assert!(ctx.metadata.is_some());

        let result = step.resume(&mut ctx, "not json");
        assert!(matches!(result, Err(StepError::Workflow(_))));
    }

    #[test]
    fn test_upload_requires_archive_path() {
        let client = Arc::new(CountingClient::new());
        let step = UploadStep::new(client.clone());
        let db = Database::open_in_memory().unwrap();

        let mut ctx = ctx();
        assert!(step.execute(&db, &mut ctx).is_err());
        assert_eq!(client.uploads.load(Ordering::SeqCst), 0);

        ctx.archive_path = Some("/A/x.tar".to_string());
        let recorded = step.execute(&db, &mut ctx).unwrap();
        assert_eq!(ctx.upload_url.as_deref(), Some(recorded.as_str()));
        assert_eq!(client.uploads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_durable_steps_keep_checkpoints_on_retry() {
        let client: Arc<dyn ArchiveClient> = Arc::new(CountingClient::new());
        assert!(!UploadStep::new(client.clone()).rerun_on_retry());
        assert!(!PermissionBookmarkStep::new(client.clone()).rerun_on_retry());
        assert!(RegisterStep::new(client).rerun_on_retry());
    }

    #[test]
    fn test_bookmark_step_grants_once_per_collection() {
        let db = Database::open_in_memory().unwrap();
        let client = Arc::new(CountingClient::new());
        let step = PermissionBookmarkStep::new(client.clone());

        let mut ctx = ctx();
        ctx.archive_path = Some("/A/PI_X/projects/x.tar".to_string());

        let recorded = step.execute(&db, &mut ctx).unwrap();
        assert_eq!(recorded, "/A/PI_X/projects");
        assert_eq!(client.bookmarks.load(Ordering::SeqCst), 1);

        // Second object in the same collection: bookmark already recorded.
        let mut ctx2 = ctx2_with_path("/A/PI_X/projects/y.tar");
        step.execute(&db, &mut ctx2).unwrap();
        assert_eq!(client.bookmarks.load(Ordering::SeqCst), 1);
    }

    fn ctx2_with_path(path: &str) -> WorkflowContext {
        let mut c = ctx();
        c.archive_path = Some(path.to_string());
        c
    }
}
