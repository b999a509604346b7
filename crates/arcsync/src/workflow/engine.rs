//! Workflow engine: claims a task, drives it through the fixed step
//! sequence with checkpointing, and settles its terminal or retryable
//! state.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};
use tracing::info_span;

use crate::archive::ArchiveClient;
use crate::db::{status_repo, task_repo, Database, StatusInfo, SyncStatus, TaskInfo};
use crate::notify::Notifier;
use crate::processor::ProcessorRegistry;

use super::context::WorkflowContext;
use super::error::StepError;
use super::steps::{
    BuildMetadataStep, ComputeArchivePathStep, PermissionBookmarkStep, RegisterStep, UploadStep,
    WorkflowStep,
};

/// What happened to a dispatched task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// All steps ran to completion; the record is COMPLETED.
    Completed,
    /// A retryable failure occurred below the ceiling; the record is ERROR
    /// and eligible for redelivery.
    Errored,
    /// Non-retryable failure or retry ceiling reached; the record is FAILED.
    Failed,
    /// Another execution holds the claim, or the task is already retired.
    AlreadyActive,
}

pub struct WorkflowEngine {
    db: Database,
    notifier: Arc<dyn Notifier>,
    retry_ceiling: u32,
    steps: Vec<Box<dyn WorkflowStep>>,
}

impl WorkflowEngine {
    pub fn new(
        db: Database,
        registry: Arc<ProcessorRegistry>,
        client: Arc<dyn ArchiveClient>,
        notifier: Arc<dyn Notifier>,
        retry_ceiling: u32,
    ) -> Self {
        let steps: Vec<Box<dyn WorkflowStep>> = vec![
            Box::new(ComputeArchivePathStep::new(registry.clone())),
            Box::new(BuildMetadataStep::new(registry)),
            Box::new(UploadStep::new(client.clone())),
            Box::new(RegisterStep::new(client.clone())),
            Box::new(PermissionBookmarkStep::new(client)),
        ];
        Self {
            db,
            notifier,
            retry_ceiling,
            steps,
        }
    }

    /// Runs one execution attempt for the given record.
    ///
    /// Claims the record first; a lost claim returns `AlreadyActive`
    /// without touching any state. Steps whose checkpoint exists are
    /// skipped and their recorded value rehydrated into the context.
    pub fn start(&self, status: StatusInfo) -> Result<Outcome, StepError> {
        let now = Utc::now();
        if !status_repo::try_claim(&self.db, status.id, now)? {
            debug!(
                "Skipping {}: already in progress or retired",
                status.original_file_path
            );
            return Ok(Outcome::AlreadyActive);
        }

        match self.run_claimed(status.id) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                // The claim must not outlive the attempt: a store failure
                // mid-attempt would otherwise strand the row IN_PROGRESS,
                // which no redelivery can reclaim.
                if let Err(release_err) =
                    status_repo::release_to_error(&self.db, status.id, &err.to_string())
                {
                    error!(
                        "Failed to release claim on record {}: {}",
                        status.id, release_err
                    );
                }
                Err(err)
            }
        }
    }

    fn run_claimed(&self, id: i64) -> Result<Outcome, StepError> {
        // Re-read after the claim so timestamps and retry counts reflect
        // the stored row, not the caller's possibly stale copy.
        let status = status_repo::find_by_id(&self.db, id)?
            .ok_or_else(|| StepError::Workflow(format!("Record {} vanished", id)))?;

        info!(
            "Starting sync workflow for {} (doc: {}, attempt: {})",
            status.original_file_path,
            status.doc,
            status.retry_count + 1
        );

        let mut ctx = WorkflowContext::new(status);

        for step in &self.steps {
            let span = info_span!("workflow_step", step = step.name(), object_id = ctx.status.id);
            let _guard = span.enter();

            if let Some(checkpoint) =
                task_repo::find_checkpoint(&self.db, ctx.status.id, step.name())?
            {
                debug!("Step {} already completed, resuming from checkpoint", step.name());
                if let Err(err) = step.resume(&mut ctx, &checkpoint.result) {
                    return self.handle_failure(ctx.status, step.name(), err);
                }
                continue;
            }

            match step.execute(&self.db, &mut ctx) {
                Ok(recorded) => {
                    task_repo::save_checkpoint(
                        &self.db,
                        &TaskInfo::new(ctx.status.id, step.name(), recorded),
                    )?;
                }
                Err(err) => {
                    return self.handle_failure(ctx.status, step.name(), err);
                }
            }
        }

        self.complete_workflow(ctx.status)
    }

    fn complete_workflow(&self, mut status: StatusInfo) -> Result<Outcome, StepError> {
        status.status = SyncStatus::Completed;
        status.end_timestamp = Some(Utc::now());
        status.error_message = None;
        status_repo::update(&self.db, &status)?;
        task_repo::delete_all_checkpoints(&self.db, status.id)?;

        self.notifier.completed(&status);
        Ok(Outcome::Completed)
    }

    fn handle_failure(
        &self,
        mut status: StatusInfo,
        step_name: &str,
        err: StepError,
    ) -> Result<Outcome, StepError> {
        status.retry_count += 1;
        status.error_message = Some(format!("Step {} failed: {}", step_name, err));

        if err.is_retryable() && status.retry_count < self.retry_ceiling {
            warn!(
                "Step {} failed for {} (attempt {}/{}), will retry: {}",
                step_name, status.original_file_path, status.retry_count, self.retry_ceiling, err
            );
            self.retry_workflow(status)
        } else {
            self.fail_workflow(status)
        }
    }

    /// Parks the record in ERROR for redelivery. Checkpoints of re-runnable
    /// steps are cleared; durable steps keep theirs.
    fn retry_workflow(&self, mut status: StatusInfo) -> Result<Outcome, StepError> {
        for step in &self.steps {
            if step.rerun_on_retry() {
                task_repo::delete_checkpoint(&self.db, status.id, step.name())?;
            }
        }

        status.status = SyncStatus::Error;
        status_repo::update(&self.db, &status)?;
        Ok(Outcome::Errored)
    }

    fn fail_workflow(&self, mut status: StatusInfo) -> Result<Outcome, StepError> {
        status.status = SyncStatus::Failed;
        status.end_timestamp = Some(Utc::now());
        status_repo::update(&self.db, &status)?;

        self.notifier.failed(&status);
        Ok(Outcome::Failed)
    }
}
