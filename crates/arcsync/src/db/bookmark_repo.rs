//! Permission bookmark repository.
//!
//! Tracks whether a destination collection's access bookmark was already
//! created, so permission grants are not re-issued across retries.

use rusqlite::params;

use super::{Database, DatabaseError};

/// Returns true if a bookmark was already created for the collection.
pub fn is_created(db: &Database, collection_path: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT created FROM permission_bookmark_info WHERE collection_path = ?1",
        )?;
        let mut rows = stmt.query_map(params![collection_path], |r| r.get::<_, String>(0))?;
        match rows.next() {
            Some(Ok(flag)) => Ok(flag == "Y"),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(false),
        }
    })
}

/// Marks the collection's bookmark as created.
pub fn mark_created(db: &Database, collection_path: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO permission_bookmark_info (collection_path, created)
             VALUES (?1, 'Y')
             ON CONFLICT (collection_path) DO UPDATE SET created = 'Y',
             updated_at = datetime('now')",
            params![collection_path],
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bookmark_lifecycle() {
        let db = Database::open_in_memory().unwrap();

        assert!(!is_created(&db, "/Archive/PI_Subramaniam").unwrap());

        mark_created(&db, "/Archive/PI_Subramaniam").unwrap();
        assert!(is_created(&db, "/Archive/PI_Subramaniam").unwrap());

        // Idempotent.
        mark_created(&db, "/Archive/PI_Subramaniam").unwrap();
        assert!(is_created(&db, "/Archive/PI_Subramaniam").unwrap());

        assert!(!is_created(&db, "/Archive/PI_Other").unwrap());
    }
}
