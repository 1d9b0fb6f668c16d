use crate::aggregate::coefficient_of_variation;
use crate::model::{FailureType, Record, Severity};
use std::collections::{BTreeMap, BTreeSet};

/// Stability metrics for one case across repeated executions within a run.
/// Informational only: flakiness never fails the gate by itself.
#[derive(Debug, Clone)]
pub struct CaseStability {
    pub run_id: String,
    pub case_id: String,
    pub severity: Severity,
    pub attempts: u64,
    pub passes: u64,
    pub pass_rate: f64,
    /// Both outcomes observed under identical input.
    pub flaky: bool,
    pub failure_types: BTreeSet<FailureType>,
    pub latency_cv: f64,
}

/// Group records by `(run_id, case_id)` and compute stability metrics for
/// every group with more than one attempt. Sorted flaky-first, then by
/// ascending pass rate, then S1 first, then case_id.
pub fn compute_stability(records: &[Record]) -> Vec<CaseStability> {
    let mut groups: BTreeMap<(String, String), Vec<&Record>> = BTreeMap::new();
    for r in records {
        groups
            .entry((r.run_id.clone(), r.case_id.clone()))
            .or_default()
            .push(r);
    }

    let mut stats: Vec<CaseStability> = groups
        .into_iter()
        .filter(|(_, runs)| runs.len() > 1)
        .map(|((run_id, case_id), runs)| {
            let attempts = runs.len() as u64;
            let passes = runs.iter().filter(|r| r.passed).count() as u64;
            let latencies: Vec<f64> = runs.iter().map(|r| r.latency_ms).collect();
            let failure_types = runs.iter().filter_map(|r| r.failure_type).collect();
            let pass_rate = passes as f64 / attempts as f64;
            CaseStability {
                run_id,
                case_id,
                severity: runs[0].severity,
                attempts,
                passes,
                pass_rate,
                flaky: passes > 0 && passes < attempts,
                failure_types,
                latency_cv: coefficient_of_variation(&latencies),
            }
        })
        .collect();

    stats.sort_by(|a, b| {
        b.flaky
            .cmp(&a.flaky)
            .then_with(|| a.pass_rate.partial_cmp(&b.pass_rate).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.severity.cmp(&b.severity))
            .then_with(|| a.case_id.cmp(&b.case_id))
    });
    stats
}
