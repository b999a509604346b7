use crate::db::StatusInfo;
use crate::metadata::MetadataRequest;

/// Mutable state threaded through one execution attempt. Step results are
/// filled either by executing the step or by rehydrating from its
/// checkpoint value.
pub struct WorkflowContext {
    pub status: StatusInfo,

    // compute_archive_path result
    pub archive_path: Option<String>,

    // build_metadata result
    pub metadata: Option<MetadataRequest>,

    // upload_file result
    pub upload_url: Option<String>,
}

impl WorkflowContext {
    pub fn new(status: StatusInfo) -> Self {
        Self {
            status,
            archive_path: None,
            metadata: None,
            upload_url: None,
        }
    }
}
