//! Mapping-driven strategy used by most configured docs.
//!
//! The archive path is derived from the original source path: the doc's
//! source base directory is stripped, the leading component (the lab's
//! internal folder name) is translated through the collection-name mapping
//! store into an institutional collection, intermediate components are
//! kept, and the packaged file name from `source_file_path` is appended.
//!
//! For doc `lcb` with mapping `PI_Lab: Livlab -> Subramaniam` and base
//! `/CCR_LCB_SubramaniamLab_Archive`, the original path
//! `/data/Livlab/projects/GluK2` with source `/work/lcb/projects/GluK2.tar`
//! becomes `/CCR_LCB_SubramaniamLab_Archive/PI_Subramaniam/projects/GluK2.tar`.

use crate::config::{CollectionLevel, DocConfig};
use crate::db::{mapping_repo, Database, StatusInfo};
use crate::metadata::MetadataRequest;
use crate::workflow::StepError;

use super::{build_bulk_entries, build_object_entries, strip_dir_prefix, DocProcessor};

pub struct MappedProcessor {
    destination_base_dir: String,
    source_base_dir: String,
    collections: Vec<CollectionLevel>,
}

impl MappedProcessor {
    pub fn new(
        destination_base_dir: impl Into<String>,
        source_base_dir: impl Into<String>,
        collections: Vec<CollectionLevel>,
    ) -> Self {
        Self {
            destination_base_dir: destination_base_dir.into(),
            source_base_dir: source_base_dir.into(),
            collections,
        }
    }

    pub fn from_config(config: &DocConfig) -> Self {
        Self::new(
            &config.destination_base_dir,
            &config.source_base_dir,
            config.collections.clone(),
        )
    }

    /// Path components of the original file path relative to the source
    /// base directory. The prefix only matches on a component boundary,
    /// so `/data` does not strip from `/database/...`.
    fn relative_components<'a>(&self, status: &'a StatusInfo) -> Vec<&'a str> {
        strip_dir_prefix(&status.original_file_path, &self.source_base_dir)
            .split('/')
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// Collection type attached at a path level. Levels deeper than the
    /// configuration reuse the last configured type.
    fn type_for_level(&self, level: usize) -> String {
        self.collections
            .get(level)
            .or_else(|| self.collections.last())
            .map(|c| c.collection_type.clone())
            .unwrap_or_else(|| "Folder".to_string())
    }
}

impl DocProcessor for MappedProcessor {
    fn compute_archive_path(
        &self,
        db: &Database,
        status: &StatusInfo,
    ) -> Result<String, StepError> {
        let components = self.relative_components(status);
        let Some((lab_key, rest)) = components.split_first() else {
            return Err(StepError::Workflow(format!(
                "Original path '{}' has no components under source base '{}'",
                status.original_file_path, self.source_base_dir
            )));
        };
        // The deepest original component is the dataset itself; the archive
        // object is named after the packaged source file instead.
        let middle = if rest.is_empty() {
            rest
        } else {
            &rest[..rest.len() - 1]
        };

        let mut path = self.destination_base_dir.trim_end_matches('/').to_string();

        if let Some(level) = self.collections.first() {
            let mapped =
                mapping_repo::get_collection_name(db, lab_key, &level.collection_type, &status.doc)?
                    .ok_or_else(|| StepError::Mapping {
                        key: format!("{}/{}/{}", lab_key, level.collection_type, status.doc),
                    })?;
            path.push('/');
            path.push_str(&level.prefix);
            path.push_str(&mapped);
        } else {
            path.push('/');
            path.push_str(lab_key);
        }

        for component in middle {
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
                |level| self.type_for_level(level),
            )?,
            metadata_entries: build_object_entries(status)?,
        })
    }
}
