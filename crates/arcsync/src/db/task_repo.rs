//! Task repository — per-step checkpoints (`task_info` table).
//!
//! A row's presence means the named step's side effect has been durably
//! applied for that object and must not be repeated on resume. The stored
//! `result` is the step's recorded value, reused when the step is skipped.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// Completion marker for one named step of one StatusInfo.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub object_id: i64,
    pub task_name: String,
    pub result: String,
}

impl TaskInfo {
    pub fn new(object_id: i64, task_name: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            object_id,
            task_name: task_name.into(),
            result: result.into(),
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            object_id: row.get("object_id")?,
            task_name: row.get("task_name")?,
            result: row.get("result")?,
        })
    }
}

/// Finds the checkpoint for a step, if the step already completed.
pub fn find_checkpoint(
    db: &Database,
    object_id: i64,
    task_name: &str,
) -> Result<Option<TaskInfo>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM task_info WHERE object_id = ?1 AND task_name = ?2")?;
        let mut rows = stmt.query_map(params![object_id, task_name], TaskInfo::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Persists a checkpoint. Replaces any previous checkpoint for the step.
pub fn save_checkpoint(db: &Database, task: &TaskInfo) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO task_info (object_id, task_name, result) VALUES (?1, ?2, ?3)
             ON CONFLICT (object_id, task_name) DO UPDATE SET result = excluded.result",
            params![task.object_id, task.task_name, task.result],
        )?;
        Ok(())
    })
}

/// Removes one step's checkpoint so the step re-executes on the next attempt.
pub fn delete_checkpoint(
    db: &Database,
    object_id: i64,
    task_name: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "DELETE FROM task_info WHERE object_id = ?1 AND task_name = ?2",
            params![object_id, task_name],
        )?;
        Ok(())
    })
}

/// Removes all checkpoints for an object (done on workflow completion).
pub fn delete_all_checkpoints(db: &Database, object_id: i64) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "DELETE FROM task_info WHERE object_id = ?1",
            params![object_id],
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_save_and_find() {
        let db = test_db();
        save_checkpoint(&db, &TaskInfo::new(1, "upload_file", "https://upload")).unwrap();

        let found = find_checkpoint(&db, 1, "upload_file").unwrap().unwrap();
        assert_eq!(found.result, "https://upload");
        assert!(find_checkpoint(&db, 1, "register_metadata")
            .unwrap()
            .is_none());
        assert!(find_checkpoint(&db, 2, "upload_file").unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_existing() {
        let db = test_db();
        save_checkpoint(&db, &TaskInfo::new(1, "compute_archive_path", "/a")).unwrap();
        save_checkpoint(&db, &TaskInfo::new(1, "compute_archive_path", "/b")).unwrap();

        let found = find_checkpoint(&db, 1, "compute_archive_path")
            .unwrap()
            .unwrap();
        assert_eq!(found.result, "/b");
    }

    #[test]
    fn test_delete_checkpoint() {
        let db = test_db();
        save_checkpoint(&db, &TaskInfo::new(1, "build_metadata", "{}")).unwrap();
        delete_checkpoint(&db, 1, "build_metadata").unwrap();
        assert!(find_checkpoint(&db, 1, "build_metadata").unwrap().is_none());
    }

    #[test]
    fn test_delete_all_checkpoints_is_scoped() {
        let db = test_db();
        save_checkpoint(&db, &TaskInfo::new(1, "a", "")).unwrap();
        save_checkpoint(&db, &TaskInfo::new(1, "b", "")).unwrap();
        save_checkpoint(&db, &TaskInfo::new(2, "a", "")).unwrap();

        delete_all_checkpoints(&db, 1).unwrap();

        assert!(find_checkpoint(&db, 1, "a").unwrap().is_none());
        assert!(find_checkpoint(&db, 1, "b").unwrap().is_none());
        assert!(find_checkpoint(&db, 2, "a").unwrap().is_some());
    }
}
