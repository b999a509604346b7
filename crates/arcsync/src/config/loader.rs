use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let compiled =
        jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
            message: format!("Failed to compile JSON schema: {}", e),
        })?;

    let error_messages: Vec<String> = compiled
        .iter_errors(json_value)
        .map(|e| format!("{} at {}", e, e.instance_path()))
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Validate version
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "workerCount must be at least 1".to_string(),
        });
    }

    if config.retry_ceiling == 0 {
        return Err(ConfigError::Validation {
            message: "retryCeiling must be at least 1".to_string(),
        });
    }

    // Validate doc entries
    let mut doc_tags = std::collections::HashSet::new();
    for doc in &config.docs {
        if !doc_tags.insert(&doc.doc) {
            return Err(ConfigError::InvalidDoc {
                doc: doc.doc.clone(),
                reason: "Duplicate doc tag".to_string(),
            });
        }

        if doc.destination_base_dir.trim().is_empty() {
            return Err(ConfigError::InvalidDoc {
                doc: doc.doc.clone(),
                reason: "destinationBaseDir must not be empty".to_string(),
            });
        }

        if !doc.destination_base_dir.starts_with('/') {
            return Err(ConfigError::InvalidDoc {
                doc: doc.doc.clone(),
                reason: "destinationBaseDir must be an absolute archive path".to_string(),
            });
        }
    }

    Ok(())
}
