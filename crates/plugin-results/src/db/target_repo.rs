//! Target and session repository: the rows the result store scopes by.

use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

/// Inserts a target and returns its id.
pub fn create_target(db: &Database, target_url: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO targets (target_url) VALUES (?1)",
            params![target_url],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Looks up a target URL by id.
pub fn find_target(db: &Database, target_id: i64) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let url = conn
            .query_row(
                "SELECT target_url FROM targets WHERE id = ?1",
                params![target_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(url)
    })
}

/// Inserts a session and returns its id.
pub fn create_session(db: &Database, name: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute("INSERT INTO sessions (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    })
}

/// Links a target to a session. Linking twice is a no-op.
pub fn add_target_to_session(
    db: &Database,
    session_id: i64,
    target_id: i64,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO session_targets (session_id, target_id) VALUES (?1, ?2)",
            params![session_id, target_id],
        )?;
        Ok(())
    })
}

/// Returns the ids of all targets in a session, ascending.
pub fn target_ids_for_session(db: &Database, session_id: i64) -> Result<Vec<i64>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT target_id FROM session_targets WHERE session_id = ?1 ORDER BY target_id",
        )?;
        let ids = stmt
            .query_map(params![session_id], |r| r.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    })
}
