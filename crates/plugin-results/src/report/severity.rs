//! Severity histogram over the results of a session's targets.

use std::collections::HashSet;

use serde::Serialize;

use crate::db::{output_repo, target_repo, Database, DatabaseError};
use crate::models::effective_rank;

const SEVERITY_LABELS: [&str; 6] = ["Passing", "Info", "Low", "Medium", "High", "Critical"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeverityBucket {
    pub id: i32,
    pub label: &'static str,
    pub value: u64,
}

/// Histogram envelope, buckets ordered Critical first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeverityReport {
    pub data: Vec<SeverityBucket>,
}

impl SeverityReport {
    /// Count for a rank, independent of output order.
    pub fn count(&self, rank: i32) -> u64 {
        self.data
            .iter()
            .find(|b| b.id == rank)
            .map(|b| b.value)
            .unwrap_or(0)
    }
}

/// Counts results by effective rank for every target of a session.
///
/// Every record is scanned and then filtered by target membership in memory.
/// A manual rank wins over the computed one; records with neither are skipped.
pub fn severity_histogram(db: &Database, session_id: i64) -> Result<SeverityReport, DatabaseError> {
    let _span = tracing::info_span!("report.severity", session_id).entered();

    let targets: HashSet<i64> = target_repo::target_ids_for_session(db, session_id)?
        .into_iter()
        .collect();

    let mut buckets: Vec<SeverityBucket> = SEVERITY_LABELS
        .iter()
        .enumerate()
        .map(|(id, label)| SeverityBucket {
            id: id as i32,
            label: *label,
            value: 0,
        })
        .collect();

    for (target_id, user_rank, owtf_rank) in output_repo::scan_ranks(db)? {
        if !targets.contains(&target_id) {
            continue;
        }
        let Some(rank) = effective_rank(user_rank, owtf_rank) else {
            continue;
        };
        match buckets.get_mut(rank as usize) {
            Some(bucket) if rank >= 0 => bucket.value += 1,
            _ => log::warn!(
                "Skipping out-of-range rank {} on target {}",
                rank,
                target_id
            ),
        }
    }

    buckets.reverse();
    Ok(SeverityReport { data: buckets })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::output_repo::{NewOutput, OutputKey};
    use crate::db::OutputPatch;
    use chrono::Utc;

    fn save(db: &Database, target_id: i64, code: &str, owtf_rank: i32) -> OutputKey {
        let now = Utc::now();
        let key = OutputKey::new("web", "active", code);
        output_repo::upsert(
            db,
            &NewOutput {
                target_id,
                key: key.clone(),
                plugin_key: format!("active@{}", code),
                status: "Successful".to_string(),
                output: None,
                output_path: None,
                error: None,
                start_time: now,
                end_time: now,
                owtf_rank,
            },
        )
        .unwrap();
        key
    }

    #[test]
    fn test_histogram_scoped_to_session() {
        let db = Database::open_in_memory().unwrap();
        let t1 = target_repo::create_target(&db, "http://one").unwrap();
        let t2 = target_repo::create_target(&db, "http://two").unwrap();
        let t3 = target_repo::create_target(&db, "http://three").unwrap();
        let session = target_repo::create_session(&db, "audit").unwrap();
        target_repo::add_target_to_session(&db, session, t1).unwrap();
        target_repo::add_target_to_session(&db, session, t2).unwrap();

        let a = save(&db, t1, "A", -1);
        output_repo::apply_patch(&db, t1, &a, &OutputPatch::rank(4)).unwrap();
        save(&db, t2, "B", 2);
        let c = save(&db, t3, "C", -1);
        output_repo::apply_patch(&db, t3, &c, &OutputPatch::rank(5)).unwrap();
        save(&db, t1, "D", -1);

        let report = severity_histogram(&db, session).unwrap();
        let labels: Vec<_> = report.data.iter().map(|b| b.label).collect();
        assert_eq!(
            labels,
            vec!["Critical", "High", "Medium", "Low", "Info", "Passing"]
        );
        let values: Vec<_> = report.data.iter().map(|b| b.value).collect();
        assert_eq!(values, vec![0, 1, 0, 1, 0, 0]);
        assert_eq!(report.count(4), 1);
        assert_eq!(report.count(2), 1);
        assert_eq!(report.count(5), 0);
    }

    #[test]
    fn test_user_rank_overrides_owtf_rank() {
        let db = Database::open_in_memory().unwrap();
        let t1 = target_repo::create_target(&db, "http://one").unwrap();
        let session = target_repo::create_session(&db, "s").unwrap();
        target_repo::add_target_to_session(&db, session, t1).unwrap();

        let key = save(&db, t1, "A", 3);
        output_repo::apply_patch(&db, t1, &key, &OutputPatch::rank(0)).unwrap();

        let report = severity_histogram(&db, session).unwrap();
        assert_eq!(report.count(0), 1);
        assert_eq!(report.count(3), 0);
    }

    #[test]
    fn test_unknown_session_yields_empty_histogram() {
        let db = Database::open_in_memory().unwrap();
        let report = severity_histogram(&db, 42).unwrap();
        assert_eq!(report.data.len(), 6);
        assert!(report.data.iter().all(|b| b.value == 0));
    }
}
