//! Per-doc archive strategies.
//!
//! Each source domain ("doc") is bound to a `DocProcessor` that turns a
//! `StatusInfo` into an archive path and a metadata registration request.
//! The registry is built once at startup; unknown tags fall back to the
//! default strategy, so dispatch never fails.

pub mod default;
pub mod mapped;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::db::{mapping_repo, Database, StatusInfo};
use crate::metadata::{
    BulkMetadataEntries, MetadataEntry, MetadataRequest, PathMetadataEntries,
    MODIFIED_DATE_FORMAT,
};
use crate::workflow::StepError;

pub use default::DefaultProcessor;
pub use mapped::MappedProcessor;

/// Strategy for one source domain. Implementations are pure functions over
/// the status record and the mapping store; they hold no state of their own.
pub trait DocProcessor: Send + Sync {
    /// Computes the destination path inside the archive. Deterministic for
    /// fixed inputs and mapping configuration.
    fn compute_archive_path(&self, db: &Database, status: &StatusInfo)
        -> Result<String, StepError>;

    /// Builds the registration request: bulk metadata for every ancestor
    /// collection plus the fixed object-level entries.
    fn build_metadata_request(
        &self,
        db: &Database,
        status: &StatusInfo,
    ) -> Result<MetadataRequest, StepError>;
}

/// Maps doc tags to strategies, with a designated default for unknown tags.
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn DocProcessor>>,
    default: Arc<dyn DocProcessor>,
}

impl ProcessorRegistry {
    pub fn new(default: Arc<dyn DocProcessor>) -> Self {
        Self {
            processors: HashMap::new(),
            default,
        }
    }

    /// Builds the registry from config: one mapped strategy per configured
    /// doc, and the fallback strategy for everything else.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new(Arc::new(DefaultProcessor::new(
            &config.defaults.destination_base_dir,
        )));

        for doc_config in &config.docs {
            registry.register(
                &doc_config.doc,
                Arc::new(MappedProcessor::from_config(doc_config)),
            );
        }

        registry
    }

    /// Binds a strategy to a doc tag, replacing any previous binding.
    pub fn register(&mut self, doc: &str, processor: Arc<dyn DocProcessor>) {
        self.processors.insert(doc.to_string(), processor);
    }

    /// Resolves the strategy for a doc tag. Unknown tags get the default
    /// strategy; this lookup cannot fail.
    pub fn resolve(&self, doc: &str) -> Arc<dyn DocProcessor> {
        self.processors
            .get(doc)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default))
    }

    pub fn registered_docs(&self) -> impl Iterator<Item = &str> {
        self.processors.keys().map(|k| k.as_str())
    }
}

/// Strips a directory prefix on a component boundary. Returns the path
/// unchanged when the prefix does not cover whole leading components,
/// so `/data` does not strip from `/database/...`.
pub(crate) fn strip_dir_prefix<'a>(path: &'a str, prefix: &str) -> &'a str {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    }
}

/// Splits an archive path into its ancestor collection names below the
/// base directory, excluding the object itself.
fn ancestor_collections<'a>(archive_path: &'a str, base_dir: &str) -> Vec<&'a str> {
    let rel = strip_dir_prefix(archive_path, base_dir).trim_matches('/');
    let mut components: Vec<&str> = rel.split('/').filter(|c| !c.is_empty()).collect();
    components.pop(); // drop the object name
    components
}

/// Assembles the bulk metadata entries for every ancestor collection of the
/// archive path. Each collection carries a `collection_type` attribute plus
/// the mapped key/values configured for (type, name, doc).
pub(crate) fn build_bulk_entries(
    db: &Database,
    doc: &str,
    archive_path: &str,
    base_dir: &str,
    type_for_level: impl Fn(usize) -> String,
) -> Result<BulkMetadataEntries, StepError> {
    let mut paths_metadata_entries = Vec::new();
    let mut collection_path = base_dir.trim_end_matches('/').to_string();

    for (level, name) in ancestor_collections(archive_path, base_dir)
        .into_iter()
        .enumerate()
    {
        collection_path.push('/');
        collection_path.push_str(name);

        let collection_type = type_for_level(level);
        let mut entries = vec![MetadataEntry::new("collection_type", &collection_type)];

        for (key, value) in mapping_repo::get_metadata_for_collection(db, &collection_type, name, doc)? {
            entries.push(MetadataEntry::new(key, value));
        }

        paths_metadata_entries.push(PathMetadataEntries {
            path: collection_path.clone(),
            path_metadata_entries: entries,
        });
    }

    Ok(BulkMetadataEntries {
        paths_metadata_entries,
    })
}

/// Builds the fixed object-level entries: `object_name`, `source_path`,
/// `modified_date` (source file mtime, MM-dd-yyyy HH:mm:ss), in that order.
pub(crate) fn build_object_entries(status: &StatusInfo) -> Result<Vec<MetadataEntry>, StepError> {
    let source = std::path::Path::new(&status.source_file_path);
    let modified = std::fs::metadata(source)
        .and_then(|m| m.modified())
        .map_err(|e| StepError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
    let modified: DateTime<Utc> = modified.into();

    Ok(vec![
        MetadataEntry::new("object_name", &status.source_file_name),
        MetadataEntry::new("source_path", &status.original_file_path),
        MetadataEntry::new(
            "modified_date",
            modified.format(MODIFIED_DATE_FORMAT).to_string(),
        ),
    ])
}
