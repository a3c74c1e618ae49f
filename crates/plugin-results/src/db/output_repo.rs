//! Plugin output repository: SQL over the `plugin_outputs` table.
//!
//! Rows are identified by the natural key
//! `(target_id, plugin_group, plugin_type, plugin_code)`.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::filter::{OutputFilter, OutputPatch, QueryMode};
use super::{Database, DatabaseError};
use crate::models::{ResultRecord, UniqueValues, UNRANKED};

/// Identifies a plugin run within one target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputKey {
    pub plugin_group: String,
    pub plugin_type: String,
    pub plugin_code: String,
}

impl OutputKey {
    pub fn new(group: &str, plugin_type: &str, code: &str) -> Self {
        Self {
            plugin_group: group.to_string(),
            plugin_type: plugin_type.to_string(),
            plugin_code: code.to_string(),
        }
    }
}

impl ResultRecord {
    pub fn key(&self) -> OutputKey {
        OutputKey::new(&self.plugin_group, &self.plugin_type, &self.plugin_code)
    }
}

/// Field values written by a save. Review fields are never part of a save.
#[derive(Debug, Clone)]
pub struct NewOutput {
    pub target_id: i64,
    pub key: OutputKey,
    pub plugin_key: String,
    pub status: String,
    pub output: Option<String>,
    pub output_path: Option<String>,
    pub error: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub owtf_rank: i32,
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

fn find_in(
    conn: &Connection,
    target_id: i64,
    key: &OutputKey,
) -> Result<Option<ResultRecord>, DatabaseError> {
    let record = conn
        .query_row(
            "SELECT * FROM plugin_outputs
             WHERE target_id = ?1 AND plugin_group = ?2 AND plugin_type = ?3 AND plugin_code = ?4",
            params![target_id, key.plugin_group, key.plugin_type, key.plugin_code],
            ResultRecord::from_row,
        )
        .optional()?;
    Ok(record)
}

/// Finds a record by natural key.
pub fn find(
    db: &Database,
    target_id: i64,
    key: &OutputKey,
) -> Result<Option<ResultRecord>, DatabaseError> {
    db.with_conn(|conn| find_in(conn, target_id, key))
}

/// Inserts or overwrites the record for `new.key` in one transaction.
///
/// An existing record keeps its review fields (`user_rank`, `user_notes`).
/// If it carries a manual rank, the computed rank stays at `-1`.
pub fn upsert(db: &Database, new: &NewOutput) -> Result<UpsertOutcome, DatabaseError> {
    db.with_tx(|conn| match find_in(conn, new.target_id, &new.key)? {
        Some(existing) => {
            let owtf_rank = if existing.user_rank != UNRANKED {
                UNRANKED
            } else {
                new.owtf_rank
            };
            conn.execute(
                "UPDATE plugin_outputs SET plugin_key = ?5, status = ?6, output = ?7,
                 output_path = ?8, error = ?9, start_time = ?10, end_time = ?11,
                 owtf_rank = ?12, date_time = datetime('now')
                 WHERE target_id = ?1 AND plugin_group = ?2 AND plugin_type = ?3
                 AND plugin_code = ?4",
                params![
                    new.target_id,
                    new.key.plugin_group,
                    new.key.plugin_type,
                    new.key.plugin_code,
                    new.plugin_key,
                    new.status,
                    new.output,
                    new.output_path,
                    new.error,
                    new.start_time,
                    new.end_time,
                    owtf_rank,
                ],
            )?;
            Ok(UpsertOutcome::Updated)
        }
        None => {
            conn.execute(
                "INSERT INTO plugin_outputs (target_id, plugin_group, plugin_type, plugin_code,
                 plugin_key, status, output, output_path, error, start_time, end_time,
                 owtf_rank)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    new.target_id,
                    new.key.plugin_group,
                    new.key.plugin_type,
                    new.key.plugin_code,
                    new.plugin_key,
                    new.status,
                    new.output,
                    new.output_path,
                    new.error,
                    new.start_time,
                    new.end_time,
                    new.owtf_rank,
                ],
            )?;
            Ok(UpsertOutcome::Inserted)
        }
    })
}

/// Whether a result exists for a display key.
pub fn exists_by_plugin_key(
    db: &Database,
    plugin_key: &str,
    target_id: i64,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM plugin_outputs WHERE target_id = ?1 AND plugin_key = ?2",
            params![target_id, plugin_key],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    })
}

/// Whether a result exists for a natural key.
pub fn exists(db: &Database, target_id: i64, key: &OutputKey) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM plugin_outputs
             WHERE target_id = ?1 AND plugin_group = ?2 AND plugin_type = ?3 AND plugin_code = ?4",
            params![target_id, key.plugin_group, key.plugin_type, key.plugin_code],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    })
}

/// Applies a review patch. Returns `false` when no record matches.
///
/// A manual rank of 0 or above resets the computed rank to `-1`.
pub fn apply_patch(
    db: &Database,
    target_id: i64,
    key: &OutputKey,
    patch: &OutputPatch,
) -> Result<bool, DatabaseError> {
    db.with_tx(|conn| {
        if find_in(conn, target_id, key)?.is_none() {
            return Ok(false);
        }

        if let Some(rank) = patch.user_rank {
            conn.execute(
                "UPDATE plugin_outputs
                 SET user_rank = ?5,
                     owtf_rank = CASE WHEN ?5 >= 0 THEN -1 ELSE owtf_rank END
                 WHERE target_id = ?1 AND plugin_group = ?2 AND plugin_type = ?3
                 AND plugin_code = ?4",
                params![
                    target_id,
                    key.plugin_group,
                    key.plugin_type,
                    key.plugin_code,
                    rank
                ],
            )?;
        }
        if let Some(ref notes) = patch.user_notes {
            conn.execute(
                "UPDATE plugin_outputs SET user_notes = ?5
                 WHERE target_id = ?1 AND plugin_group = ?2 AND plugin_type = ?3
                 AND plugin_code = ?4",
                params![
                    target_id,
                    key.plugin_group,
                    key.plugin_type,
                    key.plugin_code,
                    notes
                ],
            )?;
        }
        Ok(true)
    })
}

/// Returns the records of a target matching `filter`.
pub fn query(
    db: &Database,
    filter: &OutputFilter,
    target_id: i64,
    mode: QueryMode,
) -> Result<Vec<ResultRecord>, DatabaseError> {
    let sql = filter.to_sql(target_id, mode);
    db.with_conn(|conn| {
        let query_sql = format!(
            "SELECT * FROM plugin_outputs {}{}",
            sql.where_clause(),
            sql.tail()
        );
        let mut stmt = conn.prepare(&query_sql)?;
        let rows = stmt
            .query_map(sql.params().as_slice(), ResultRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Deletes the given records of a target in one transaction. Returns the row count.
pub fn delete_keys(
    db: &Database,
    target_id: i64,
    keys: &[OutputKey],
) -> Result<usize, DatabaseError> {
    db.with_tx(|conn| {
        let mut stmt = conn.prepare(
            "DELETE FROM plugin_outputs
             WHERE target_id = ?1 AND plugin_group = ?2 AND plugin_type = ?3 AND plugin_code = ?4",
        )?;
        let mut deleted = 0;
        for key in keys {
            deleted += stmt.execute(params![
                target_id,
                key.plugin_group,
                key.plugin_type,
                key.plugin_code
            ])?;
        }
        Ok(deleted)
    })
}

/// Counts records across all targets.
pub fn count_all(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 =
            conn.query_row("SELECT COUNT(*) FROM plugin_outputs", [], |r| r.get(0))?;
        Ok(count)
    })
}

/// Counts records of one target.
pub fn count_for_target(db: &Database, target_id: i64) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM plugin_outputs WHERE target_id = ?1",
            params![target_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

fn distinct<T: rusqlite::types::FromSql>(
    conn: &Connection,
    column: &'static str,
    target_id: i64,
) -> Result<Vec<T>, DatabaseError> {
    let sql = format!(
        "SELECT DISTINCT {col} FROM plugin_outputs
         WHERE target_id = ?1 AND {col} IS NOT NULL ORDER BY {col}",
        col = column
    );
    let mut stmt = conn.prepare(&sql)?;
    let values = stmt
        .query_map(params![target_id], |r| r.get(0))?
        .collect::<Result<Vec<T>, _>>()?;
    Ok(values)
}

/// Distinct values per filterable column for one target.
pub fn unique_values(db: &Database, target_id: i64) -> Result<UniqueValues, DatabaseError> {
    db.with_conn(|conn| {
        Ok(UniqueValues {
            plugin_type: distinct(conn, "plugin_type", target_id)?,
            plugin_group: distinct(conn, "plugin_group", target_id)?,
            plugin_code: distinct(conn, "plugin_code", target_id)?,
            status: distinct(conn, "status", target_id)?,
            user_rank: distinct(conn, "user_rank", target_id)?,
            owtf_rank: distinct(conn, "owtf_rank", target_id)?,
        })
    })
}

/// Rank columns of every record: `(target_id, user_rank, owtf_rank)`.
pub fn scan_ranks(db: &Database) -> Result<Vec<(i64, i32, i32)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT target_id, user_rank, owtf_rank FROM plugin_outputs")?;
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
