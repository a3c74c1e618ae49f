//! Completed-versus-outstanding work counts for progress display.

use serde::Serialize;

use crate::db::{output_repo, work_repo, Database, DatabaseError};

/// Source of the live number of workers currently executing a plugin.
pub trait BusyWorkers {
    fn busy_worker_count(&self) -> usize;
}

impl BusyWorkers for usize {
    fn busy_worker_count(&self) -> usize {
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub complete_count: u64,
    pub left_count: u64,
}

/// Takes a progress snapshot.
///
/// The counts come from separate reads, so a save landing in between can be
/// counted on both sides or on neither.
pub fn progress(db: &Database, workers: &dyn BusyWorkers) -> Result<Progress, DatabaseError> {
    let complete_count = output_repo::count_all(db)?;
    let queued = work_repo::pending_count(db)?;
    let busy = workers.busy_worker_count() as u64;

    Ok(Progress {
        complete_count,
        left_count: queued + busy,
    })
}
