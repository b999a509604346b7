//! Configuration types, deserialized from the JSON config file.

use serde::{Deserialize, Serialize};

fn default_queue_capacity() -> usize {
    64
}

fn default_retry_ceiling() -> u32 {
    3
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,

    /// State database location. `None` means the platform default.
    #[serde(default)]
    pub database_path: Option<String>,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Consecutive-failure count after which a retryable error becomes
    /// a terminal FAILED.
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    pub docs: Vec<DocConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultsConfig {
    /// Base directory for the fallback strategy used by unknown docs.
    pub destination_base_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            destination_base_dir: "/Default_Archive".to_string(),
        }
    }
}

/// Per-doc strategy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocConfig {
    /// Source-domain tag this entry configures.
    pub doc: String,

    /// Archive base directory for this doc.
    pub destination_base_dir: String,

    /// Source prefix stripped from the original path before mapping.
    #[serde(default)]
    pub source_base_dir: String,

    /// Collection levels, outermost first. The first level's leading path
    /// component is mapped through the collection-name mapping store.
    #[serde(default)]
    pub collections: Vec<CollectionLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionLevel {
    /// Collection type attached at this level (e.g. `PI_Lab`).
    #[serde(rename = "type")]
    pub collection_type: String,

    /// Prefix prepended to the collection name (e.g. `PI_`).
    #[serde(default)]
    pub prefix: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let json = r#"{ "version": "1.0", "docs": [] }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.version, "1.0");
        assert!(config.database_path.is_none());
        assert!(config.worker_count >= 1);
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.retry_ceiling, 3);
        assert_eq!(config.defaults.destination_base_dir, "/Default_Archive");
    }

    #[test]
    fn test_doc_config_fields() {
        let json = r#"{
            "version": "1.0",
            "docs": [{
                "doc": "lcb",
                "destinationBaseDir": "/CCR_LCB_SubramaniamLab_Archive",
                "sourceBaseDir": "/data",
                "collections": [
                    { "type": "PI_Lab", "prefix": "PI_" },
                    { "type": "Project" }
                ]
            }]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        let doc = &config.docs[0];
        assert_eq!(doc.doc, "lcb");
        assert_eq!(doc.source_base_dir, "/data");
        assert_eq!(doc.collections[0].collection_type, "PI_Lab");
        assert_eq!(doc.collections[0].prefix, "PI_");
        assert_eq!(doc.collections[1].prefix, "");
    }
}
