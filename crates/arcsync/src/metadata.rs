//! Wire types for the metadata registration request sent to the archive
//! client. Field names match the registration API exactly.

use serde::{Deserialize, Serialize};

/// `modified_date` format on object-level entries (MM-dd-yyyy HH:mm:ss).
pub const MODIFIED_DATE_FORMAT: &str = "%m-%d-%Y %H:%M:%S";

/// A single attribute/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub attribute: String,
    pub value: String,
}

impl MetadataEntry {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// Metadata attached to one ancestor collection in the archive path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathMetadataEntries {
    pub path: String,
    pub path_metadata_entries: Vec<MetadataEntry>,
}

/// Bulk metadata for all parent collections of an archive path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkMetadataEntries {
    pub paths_metadata_entries: Vec<PathMetadataEntries>,
}

/// Full registration request built by a doc strategy and consumed by the
/// external archive client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRequest {
    #[serde(rename = "generateUploadRequestURL")]
    pub generate_upload_request_url: bool,
    pub create_parent_collections: bool,
    pub parent_collections_bulk_metadata_entries: BulkMetadataEntries,
    pub metadata_entries: Vec<MetadataEntry>,
}

impl MetadataRequest {
    /// Finds an object-level entry by attribute name.
    pub fn object_entry(&self, attribute: &str) -> Option<&MetadataEntry> {
        self.metadata_entries.iter().find(|e| e.attribute == attribute)
    }

    /// Finds the bulk entries for a collection path.
    pub fn path_entries(&self, path: &str) -> Option<&PathMetadataEntries> {
        self.parent_collections_bulk_metadata_entries
            .paths_metadata_entries
            .iter()
            .find(|p| p.path == path)
    }
}
