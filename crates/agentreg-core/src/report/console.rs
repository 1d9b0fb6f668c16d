use crate::engine::RunOutcome;
use crate::model::FailureType;
use std::collections::BTreeMap;

/// Compact per-run summary, printed to stdout after the runner drains its
/// queue.
pub fn print_run_summary(run_id: &str, outcome: &RunOutcome) {
    let total = outcome.records.len();
    let passed = outcome.records.iter().filter(|r| r.passed).count();

    let mut breakdown: BTreeMap<FailureType, usize> = BTreeMap::new();
    for r in &outcome.records {
        if let Some(ft) = r.failure_type {
            *breakdown.entry(ft).or_insert(0) += 1;
        }
    }

    println!(
        "run {}: {} item(s), {} passed, {} failed",
        run_id,
        total,
        passed,
        total - passed
    );
    for (ft, count) in &breakdown {
        println!("  {}: {}", ft, count);
    }
    if outcome.write_failures > 0 {
        println!("  {} record write(s) failed", outcome.write_failures);
    }
    if outcome.cancelled {
        println!("  cancelled before all items were dispatched");
    }
}
