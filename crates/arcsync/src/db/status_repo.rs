//! Status repository — per-file sync state (`status_info` table).
//!
//! A `StatusInfo` row tracks one file's journey from source to archive.
//! Rows are created by the external discovery component and mutated only
//! by the workflow engine; they are never deleted (archival record).

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// Lifecycle state of a sync task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Created by discovery, not yet picked up.
    New,
    /// Claimed by a worker; at most one worker holds this per file.
    InProgress,
    /// Terminal success.
    Completed,
    /// Failed with a retryable error; eligible for redelivery.
    Error,
    /// Terminal failure; redelivery will not be attempted.
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::New => "NEW",
            SyncStatus::InProgress => "IN_PROGRESS",
            SyncStatus::Completed => "COMPLETED",
            SyncStatus::Error => "ERROR",
            SyncStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DatabaseError> {
        match s {
            "NEW" => Ok(SyncStatus::New),
            "IN_PROGRESS" => Ok(SyncStatus::InProgress),
            "COMPLETED" => Ok(SyncStatus::Completed),
            "ERROR" => Ok(SyncStatus::Error),
            "FAILED" => Ok(SyncStatus::Failed),
            other => Err(DatabaseError::UnknownStatus(other.to_string())),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Completed | SyncStatus::Failed)
    }
}

/// One file's sync record.
#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub id: i64,
    pub doc: String,
    pub run_id: String,
    pub original_file_path: String,
    pub source_file_path: String,
    pub source_file_name: String,
    pub status: SyncStatus,
    pub start_timestamp: Option<DateTime<Utc>>,
    pub end_timestamp: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: u32,
}

impl StatusInfo {
    /// Generates a run identifier for one discovery sweep. All files found
    /// in the same sweep share it.
    pub fn new_run_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Builds a fresh record for a newly discovered file. The id is
    /// assigned by the store on insert.
    pub fn new(
        doc: impl Into<String>,
        run_id: impl Into<String>,
        original_file_path: impl Into<String>,
        source_file_path: impl Into<String>,
    ) -> Self {
        let source_file_path = source_file_path.into();
        let source_file_name = std::path::Path::new(&source_file_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            id: 0,
            doc: doc.into(),
            run_id: run_id.into(),
            original_file_path: original_file_path.into(),
            source_file_path,
            source_file_name,
            status: SyncStatus::New,
            start_timestamp: None,
            end_timestamp: None,
            error_message: None,
            retry_count: 0,
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let status_str: String = row.get("status")?;
        let status = SyncStatus::parse(&status_str).map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("unknown status '{}'", status_str).into(),
            )
        })?;
        Ok(Self {
            id: row.get("id")?,
            doc: row.get("doc")?,
            run_id: row.get("run_id")?,
            original_file_path: row.get("original_file_path")?,
            source_file_path: row.get("source_file_path")?,
            source_file_name: row.get("source_file_name")?,
            status,
            start_timestamp: row
                .get::<_, Option<String>>("start_timestamp")?
                .and_then(|s| s.parse().ok()),
            end_timestamp: row
                .get::<_, Option<String>>("end_timestamp")?
                .and_then(|s| s.parse().ok()),
            error_message: row.get("error_message")?,
            retry_count: row.get("retry_count")?,
        })
    }
}

fn fmt_ts(ts: &Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|t| t.to_rfc3339())
}

/// Inserts a new record and returns it with the store-assigned id.
pub fn insert(db: &Database, mut info: StatusInfo) -> Result<StatusInfo, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO status_info (doc, run_id, original_file_path, source_file_path,
             source_file_name, status, start_timestamp, end_timestamp, error_message, retry_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                info.doc,
                info.run_id,
                info.original_file_path,
                info.source_file_path,
                info.source_file_name,
                info.status.as_str(),
                fmt_ts(&info.start_timestamp),
                fmt_ts(&info.end_timestamp),
                info.error_message,
                info.retry_count,
            ],
        )?;
        info.id = conn.last_insert_rowid();
        Ok(info)
    })
}

/// Updates an existing record. All fields except `id` are overwritten.
pub fn update(db: &Database, info: &StatusInfo) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE status_info SET doc=?2, run_id=?3, original_file_path=?4,
             source_file_path=?5, source_file_name=?6, status=?7, start_timestamp=?8,
             end_timestamp=?9, error_message=?10, retry_count=?11
             WHERE id=?1",
            params![
                info.id,
                info.doc,
                info.run_id,
                info.original_file_path,
                info.source_file_path,
                info.source_file_name,
                info.status.as_str(),
                fmt_ts(&info.start_timestamp),
                fmt_ts(&info.end_timestamp),
                info.error_message,
                info.retry_count,
            ],
        )?;
        Ok(())
    })
}

/// Inserts or updates depending on whether the record has a store id yet.
pub fn upsert(db: &Database, info: StatusInfo) -> Result<StatusInfo, DatabaseError> {
    if info.id == 0 {
        insert(db, info)
    } else {
        update(db, &info)?;
        Ok(info)
    }
}

/// Finds a record by its id.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<StatusInfo>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM status_info WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], StatusInfo::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Finds records by original file path and status.
pub fn find_by_path_and_status(
    db: &Database,
    original_file_path: &str,
    status: SyncStatus,
) -> Result<Vec<StatusInfo>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT * FROM status_info WHERE original_file_path = ?1 AND status = ?2")?;
        let rows = stmt
            .query_map(params![original_file_path, status.as_str()], StatusInfo::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Finds all records for a run and doc.
pub fn find_by_run_and_doc(
    db: &Database,
    run_id: &str,
    doc: &str,
) -> Result<Vec<StatusInfo>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM status_info WHERE run_id = ?1 AND doc = ?2 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![run_id, doc], StatusInfo::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Finds the most recently started record whose original path starts with
/// the given prefix, scoped to a doc.
pub fn find_latest_by_path_prefix(
    db: &Database,
    doc: &str,
    prefix: &str,
) -> Result<Option<StatusInfo>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM status_info
             WHERE doc = ?1 AND original_file_path LIKE ?2 || '%'
             ORDER BY start_timestamp DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![doc, prefix], StatusInfo::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Atomically claims a record for execution.
///
/// Transitions NEW or ERROR to IN_PROGRESS in a single conditional update
/// and stamps the start timestamp on first claim. Returns false when the
/// row was not in a claimable state — a duplicate delivery lost the race
/// or the task was already retired. The store is the serialization point,
/// so two workers can never both win.
pub fn try_claim(db: &Database, id: i64, now: DateTime<Utc>) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE status_info
             SET status = 'IN_PROGRESS',
                 start_timestamp = COALESCE(start_timestamp, ?2)
             WHERE id = ?1 AND status IN ('NEW', 'ERROR')",
            params![id, now.to_rfc3339()],
        )?;
        Ok(changed == 1)
    })
}

/// Releases a held claim after a machinery failure, parking the record in
/// ERROR with the message so redelivery can reclaim it. Increments the
/// retry count. A no-op unless the row is currently IN_PROGRESS.
pub fn release_to_error(db: &Database, id: i64, message: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE status_info
             SET status = 'ERROR',
                 error_message = ?2,
                 retry_count = retry_count + 1
             WHERE id = ?1 AND status = 'IN_PROGRESS'",
            params![id, message],
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

    fn sample(path: &str) -> StatusInfo {
        StatusInfo::new("lcb", "run-1", path, format!("/work/lcb{}.tar", path))
    }

    #[test]
    fn test_insert_assigns_id_and_find() {
        let db = test_db();
        let saved = insert(&db, sample("/data/Livlab/projects/GluK2")).unwrap();
        assert!(saved.id > 0);

        let found = find_by_id(&db, saved.id).unwrap().unwrap();
        assert_eq!(found.doc, "lcb");
        assert_eq!(found.status, SyncStatus::New);
        assert_eq!(found.source_file_name, "GluK2.tar");
        assert_eq!(found.retry_count, 0);
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, 999).unwrap().is_none());
    }

    #[test]
    fn test_update_roundtrip() {
        let db = test_db();
        let mut saved = insert(&db, sample("/data/a")).unwrap();

        saved.status = SyncStatus::Completed;
        saved.end_timestamp = Some(Utc::now());
        saved.retry_count = 2;
        update(&db, &saved).unwrap();

        let found = find_by_id(&db, saved.id).unwrap().unwrap();
        assert_eq!(found.status, SyncStatus::Completed);
        assert!(found.end_timestamp.is_some());
        assert_eq!(found.retry_count, 2);
    }

    #[test]
    fn test_upsert_inserts_then_updates() {
        let db = test_db();
        let saved = upsert(&db, sample("/data/b")).unwrap();
        assert!(saved.id > 0);

        let mut again = saved.clone();
        again.error_message = Some("boom".to_string());
        let again = upsert(&db, again).unwrap();
        assert_eq!(again.id, saved.id);

        let found = find_by_id(&db, saved.id).unwrap().unwrap();
        assert_eq!(found.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_find_by_path_and_status() {
        let db = test_db();
        insert(&db, sample("/data/c")).unwrap();
        let mut done = sample("/data/c");
        done.status = SyncStatus::Completed;
        insert(&db, done).unwrap();

        let new = find_by_path_and_status(&db, "/data/c", SyncStatus::New).unwrap();
        assert_eq!(new.len(), 1);
        let completed = find_by_path_and_status(&db, "/data/c", SyncStatus::Completed).unwrap();
        assert_eq!(completed.len(), 1);
    }

    #[test]
    fn test_find_by_run_and_doc() {
        let db = test_db();
        insert(&db, sample("/data/d1")).unwrap();
        insert(&db, sample("/data/d2")).unwrap();
        let mut other = sample("/data/d3");
        other.run_id = "run-2".to_string();
        insert(&db, other).unwrap();

        let rows = find_by_run_and_doc(&db, "run-1", "lcb").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(find_by_run_and_doc(&db, "run-2", "lcb").unwrap().len() == 1);
        assert!(find_by_run_and_doc(&db, "run-1", "other").unwrap().is_empty());
    }

    #[test]
    fn test_find_latest_by_path_prefix_orders_by_start() {
        let db = test_db();
        let mut old = sample("/data/Livlab/projects/old");
        old.start_timestamp = Some("2026-01-01T00:00:00Z".parse().unwrap());
        insert(&db, old).unwrap();

        let mut newer = sample("/data/Livlab/projects/newer");
        newer.start_timestamp = Some("2026-02-01T00:00:00Z".parse().unwrap());
        let newer = insert(&db, newer).unwrap();

        let latest = find_latest_by_path_prefix(&db, "lcb", "/data/Livlab")
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, newer.id);

        assert!(find_latest_by_path_prefix(&db, "lcb", "/elsewhere")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_try_claim_wins_once() {
        let db = test_db();
        let saved = insert(&db, sample("/data/e")).unwrap();

        assert!(try_claim(&db, saved.id, Utc::now()).unwrap());
        // Second claim loses: the row is already IN_PROGRESS.
        assert!(!try_claim(&db, saved.id, Utc::now()).unwrap());

        let found = find_by_id(&db, saved.id).unwrap().unwrap();
        assert_eq!(found.status, SyncStatus::InProgress);
        assert!(found.start_timestamp.is_some());
    }

    #[test]
    fn test_try_claim_reclaims_errored() {
        let db = test_db();
        let mut saved = insert(&db, sample("/data/f")).unwrap();
        saved.status = SyncStatus::Error;
        update(&db, &saved).unwrap();

        assert!(try_claim(&db, saved.id, Utc::now()).unwrap());
    }

    #[test]
    fn test_try_claim_skips_terminal() {
        let db = test_db();
        let mut saved = insert(&db, sample("/data/g")).unwrap();
        saved.status = SyncStatus::Completed;
        update(&db, &saved).unwrap();

        assert!(!try_claim(&db, saved.id, Utc::now()).unwrap());
    }

    #[test]
    fn test_release_to_error_reopens_claimed_row() {
        let db = test_db();
        let saved = insert(&db, sample("/data/h")).unwrap();
        assert!(try_claim(&db, saved.id, Utc::now()).unwrap());

        release_to_error(&db, saved.id, "store hiccup").unwrap();

        let found = find_by_id(&db, saved.id).unwrap().unwrap();
        assert_eq!(found.status, SyncStatus::Error);
        assert_eq!(found.error_message.as_deref(), Some("store hiccup"));
        assert_eq!(found.retry_count, 1);

        // The record is claimable again.
        assert!(try_claim(&db, saved.id, Utc::now()).unwrap());
    }

    #[test]
    fn test_release_to_error_only_touches_in_progress() {
        let db = test_db();
        let mut saved = insert(&db, sample("/data/i")).unwrap();
        saved.status = SyncStatus::Completed;
        update(&db, &saved).unwrap();

        release_to_error(&db, saved.id, "late failure").unwrap();

        let found = find_by_id(&db, saved.id).unwrap().unwrap();
        assert_eq!(found.status, SyncStatus::Completed);
        assert!(found.error_message.is_none());
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(StatusInfo::new_run_id(), StatusInfo::new_run_id());
    }

    #[test]
    fn test_status_parse_roundtrip() {
        for s in [
            SyncStatus::New,
            SyncStatus::InProgress,
            SyncStatus::Completed,
            SyncStatus::Error,
            SyncStatus::Failed,
        ] {
            assert_eq!(SyncStatus::parse(s.as_str()).unwrap(), s);
        }
        assert!(SyncStatus::parse("BOGUS").is_err());
        assert!(SyncStatus::Completed.is_terminal());
        assert!(SyncStatus::Failed.is_terminal());
        assert!(!SyncStatus::Error.is_terminal());
    }
}
