//! Work queue repository: pending (target, plugin) pairs awaiting a worker.

use rusqlite::params;

use super::{Database, DatabaseError};
use crate::models::PluginInfo;

/// A queued unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: i64,
    pub target_id: i64,
    pub plugin_group: String,
    pub plugin_type: String,
    pub plugin_code: String,
    pub plugin_key: String,
}

/// Queues a plugin for a target and returns the work item id.
pub fn enqueue(db: &Database, target_id: i64, plugin: &PluginInfo) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO work (target_id, plugin_group, plugin_type, plugin_code, plugin_key)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                target_id,
                plugin.group,
                plugin.plugin_type,
                plugin.code,
                plugin.key
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Counts queued work items across all targets.
pub fn pending_count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM work", [], |r| r.get(0))?;
        Ok(count)
    })
}

/// Lists queued work items in insertion order.
pub fn list_pending(db: &Database) -> Result<Vec<WorkItem>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, target_id, plugin_group, plugin_type, plugin_code, plugin_key
             FROM work ORDER BY id",
        )?;
        let items = stmt
            .query_map([], |row| {
                Ok(WorkItem {
                    id: row.get(0)?,
                    target_id: row.get(1)?,
                    plugin_group: row.get(2)?,
                    plugin_type: row.get(3)?,
                    plugin_code: row.get(4)?,
                    plugin_key: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    })
}

/// Removes a work item. Returns whether a row was deleted.
pub fn remove(db: &Database, work_id: i64) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute("DELETE FROM work WHERE id = ?1", params![work_id])?;
        Ok(deleted > 0)
    })
}
