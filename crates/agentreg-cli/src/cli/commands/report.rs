use super::exit_codes;
use crate::cli::args::ReportArgs;
use agentreg_core::aggregate::summarize;
use agentreg_core::baseline::{BaselineSummary, BaselineWindow};
use agentreg_core::config::Ruleset;
use agentreg_core::flakiness::compute_stability;
use agentreg_core::gate;
use agentreg_core::report::markdown::render_gate_report;
use agentreg_core::storage::RecordStore;
use anyhow::Context;
use chrono::{Duration, Utc};

/// Trailing-window report: the current `--days` window against the
/// `--baseline-days` window immediately before it. Reporting is
/// informational; the exit code does not track the verdict.
pub fn cmd_report(args: ReportArgs) -> anyhow::Result<i32> {
    let store = RecordStore::new(&args.log_dir);

    let end = Utc::now();
    let split = end - Duration::days(args.days);
    let baseline_start = split - Duration::days(args.baseline_days);

    let current_records = store.read_window(split, end)?;
    let baseline_records = store.read_window(baseline_start, split)?;

    let current = summarize(&current_records);
    let baseline = if baseline_records.is_empty() {
        None
    } else {
        Some(BaselineSummary {
            summary: summarize(&baseline_records),
            window: BaselineWindow::Trailing {
                days: args.baseline_days,
                end_date: split.date_naive(),
            },
        })
    };

    let stability = compute_stability(&current_records);
    let report = gate::evaluate(
        &current,
        baseline.as_ref(),
        &Ruleset::default(),
        &[],
        stability,
    );
    let md = render_gate_report(&report);

    match &args.out {
        Some(path) => {
            std::fs::write(path, &md)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => print!("{md}"),
    }

    Ok(exit_codes::OK)
}
