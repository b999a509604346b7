//! Fallback strategy for docs without a configured mapping.
//!
//! Files land under `<base>/<doc>/<original relative dirs>/<file name>`
//! with no mapping-store lookups, so an unrecognized tag still archives
//! somewhere predictable instead of failing dispatch.

use crate::db::{Database, StatusInfo};
use crate::metadata::MetadataRequest;
use crate::workflow::StepError;

use super::{build_bulk_entries, build_object_entries, DocProcessor};

pub struct DefaultProcessor {
    destination_base_dir: String,
}

impl DefaultProcessor {
    pub fn new(destination_base_dir: impl Into<String>) -> Self {
        Self {
            destination_base_dir: destination_base_dir.into(),
        }
    }
}

impl DocProcessor for DefaultProcessor {
    fn compute_archive_path(
        &self,
        _db: &Database,
        status: &StatusInfo,
    ) -> Result<String, StepError> {
        let mut components: Vec<&str> = status
            .original_file_path
            .split('/')
            .filter(|c| !c.is_empty())
            .collect();
        components.pop(); // object is named after the packaged source file

        let mut path = self.destination_base_dir.trim_end_matches('/').to_string();
        path.push('/');
        path.push_str(&status.doc);
        for component in components {
            path.push('/');
            path.push_str(component);
        }
        path.push('/');
        path.push_str(&status.source_file_name);
        Ok(path)
    }

    fn build_metadata_request(
        &self,
        db: &Database,
        status: &StatusInfo,
    ) -> Result<MetadataRequest, StepError> {
        let archive_path = self.compute_archive_path(db, status)?;

        Ok(MetadataRequest {
            generate_upload_request_url: true,
            create_parent_collections: true,
            parent_collections_bulk_metadata_entries: build_bulk_entries(
                db,
                &status.doc,
                &archive_path,
                &self.destination_base_dir,
                |_| "Folder".to_string(),
            )?,
            metadata_entries: build_object_entries(status)?,
        })
    }
}
