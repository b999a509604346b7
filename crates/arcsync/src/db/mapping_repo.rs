//! Mapping repository — configured collection-name and metadata mappings.
//!
//! These tables are owned by the external admin surface; the engine only
//! reads them. Write helpers exist for that surface and for tests.

use rusqlite::params;

use super::{Database, DatabaseError};

/// Looks up the configured collection name for a source key,
/// e.g. (`Livlab`, `PI_Lab`, `lcb`) -> `Subramaniam`.
pub fn get_collection_name(
    db: &Database,
    map_key: &str,
    collection_type: &str,
    doc: &str,
) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT map_value FROM collection_name_mapping
             WHERE map_key = ?1 AND collection_type = ?2 AND doc = ?3",
        )?;
        let mut rows = stmt.query_map(params![map_key, collection_type, doc], |r| {
            r.get::<_, String>(0)
        })?;
        match rows.next() {
            Some(Ok(v)) => Ok(Some(v)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Bulk-fetches all metadata key/value pairs configured for one collection.
pub fn get_metadata_for_collection(
    db: &Database,
    collection_type: &str,
    collection_name: &str,
    doc: &str,
) -> Result<Vec<(String, String)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT metadata_key, metadata_value FROM metadata_mapping
             WHERE collection_type = ?1 AND collection_name = ?2 AND doc = ?3
             ORDER BY metadata_key",
        )?;
        let rows = stmt
            .query_map(params![collection_type, collection_name, doc], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Upserts a collection-name mapping (admin surface / tests).
pub fn put_collection_name(
    db: &Database,
    map_key: &str,
    collection_type: &str,
    doc: &str,
    map_value: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO collection_name_mapping (map_key, collection_type, doc, map_value)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (map_key, collection_type, doc) DO UPDATE SET map_value = excluded.map_value",
            params![map_key, collection_type, doc, map_value],
        )?;
        Ok(())
    })
}

/// Upserts a metadata mapping entry (admin surface / tests).
pub fn put_metadata(
    db: &Database,
    collection_type: &str,
    collection_name: &str,
    doc: &str,
    metadata_key: &str,
    metadata_value: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO metadata_mapping
             (collection_type, collection_name, doc, metadata_key, metadata_value)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (collection_type, collection_name, doc, metadata_key)
             DO UPDATE SET metadata_value = excluded.metadata_value",
            params![collection_type, collection_name, doc, metadata_key, metadata_value],
        )?;
        Ok(())
    })
}
