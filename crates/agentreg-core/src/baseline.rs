use crate::aggregate::{summarize, RunSummary};
use crate::storage::RecordStore;
use anyhow::Result;
use chrono::{NaiveDate, TimeZone, Utc};
use std::collections::BTreeSet;
use std::path::Path;

/// Where a baseline summary came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineWindow {
    /// A directory artifact (e.g. the last green run on main).
    RunIds { baseline_run_ids: Vec<String> },
    /// A trailing window of days inside the main log dir.
    Trailing { days: i64, end_date: NaiveDate },
}

/// A run summary plus the window it was derived from. Structurally the same
/// aggregate as the current run's; never persisted.
#[derive(Debug, Clone)]
pub struct BaselineSummary {
    pub summary: RunSummary,
    pub window: BaselineWindow,
}

/// Directory mode: aggregate every record under `dir` as one baseline.
/// Returns `None` when the directory holds no records; an absent baseline
/// is a non-fatal condition for the gate.
pub fn from_directory(dir: &Path) -> Result<Option<BaselineSummary>> {
    let records = RecordStore::new(dir).read_all()?;
    if records.is_empty() {
        return Ok(None);
    }
    let run_ids: BTreeSet<String> = records.iter().map(|r| r.run_id.clone()).collect();
    Ok(Some(BaselineSummary {
        summary: summarize(&records),
        window: BaselineWindow::RunIds {
            baseline_run_ids: run_ids.into_iter().collect(),
        },
    }))
}

/// Trailing-window mode: records whose UTC date falls in
/// `[end_date - days, end_date)`, excluding the current run's records by
/// `run_id` regardless of their date.
pub fn trailing_window(
    store: &RecordStore,
    days: i64,
    end_date: NaiveDate,
    current_run_id: &str,
) -> Result<Option<BaselineSummary>> {
    let start = Utc.from_utc_datetime(
        &(end_date - chrono::Duration::days(days))
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid"),
    );
    let end = Utc.from_utc_datetime(&end_date.and_hms_opt(0, 0, 0).expect("midnight is always valid"));

    let mut records = store.read_window(start, end)?;
    records.retain(|r| r.run_id != current_run_id);
    if records.is_empty() {
        return Ok(None);
    }
    Ok(Some(BaselineSummary {
        summary: summarize(&records),
        window: BaselineWindow::Trailing { days, end_date },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Record, Severity};
    use chrono::{DateTime, TimeZone};

    fn record(run_id: &str, ts: DateTime<Utc>) -> Record {
        Record {
            run_id: run_id.into(),
            case_id: "TC001".into(),
            severity: Severity::S1,
            timestamp: ts,
            passed: true,
            failure_type: None,
            latency_ms: 100.0,
            cost: 0.0,
            tokens_total: 100,
            output_text: String::new(),
            output_json: None,
            attempt_index: 0,
        }
    }

    fn ts(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, d, h, 0, 0).unwrap()
    }

    #[test]
    fn directory_mode_collects_all_run_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        store.append(&record("main-1", ts(1, 10))).unwrap();
        store.append(&record("main-2", ts(2, 10))).unwrap();

        let baseline = from_directory(dir.path()).unwrap().unwrap();
        assert_eq!(baseline.summary.total.n_attempts, 2);
        match baseline.window {
            BaselineWindow::RunIds { baseline_run_ids } => {
                assert_eq!(baseline_run_ids, vec!["main-1", "main-2"]);
            }
            _ => panic!("expected RunIds window"),
        }
    }

    #[test]
    fn empty_directory_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(from_directory(dir.path()).unwrap().is_none());
    }

    #[test]
    fn trailing_window_excludes_current_run_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        store.append(&record("old", ts(5, 10))).unwrap();
        // Same window, but belongs to the run under evaluation.
        store.append(&record("current", ts(6, 10))).unwrap();

        let today = NaiveDate::from_ymd_opt(2026, 2, 8).unwrap();
        let baseline = trailing_window(&store, 7, today, "current").unwrap().unwrap();
        assert_eq!(baseline.summary.total.n_attempts, 1);
    }

    #[test]
    fn trailing_window_excludes_end_date_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        store.append(&record("r1", ts(7, 23))).unwrap();
        store.append(&record("r2", ts(8, 0))).unwrap();

        let today = NaiveDate::from_ymd_opt(2026, 2, 8).unwrap();
        let baseline = trailing_window(&store, 7, today, "x").unwrap().unwrap();
        assert_eq!(baseline.summary.total.n_attempts, 1);
    }

    #[test]
    fn empty_window_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let today = NaiveDate::from_ymd_opt(2026, 2, 8).unwrap();
        assert!(trailing_window(&store, 7, today, "x").unwrap().is_none());
    }
}
