use crate::aggregate::RunSummary;
use crate::baseline::BaselineSummary;
use crate::config::Ruleset;
use crate::diff::{diff_cases, CaseDiff, DiffStatus};
use crate::flakiness::CaseStability;
use crate::model::Case;

/// One row of the verdict table.
#[derive(Debug, Clone)]
pub struct GateCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl GateCheck {
    fn new(name: impl Into<String>, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }
}

/// The gate outcome plus everything the renderer needs. A pure function of
/// (current summary, baseline summary, ruleset, per-case minima).
#[derive(Debug)]
pub struct GateReport {
    pub verdict_pass: bool,
    pub checks: Vec<GateCheck>,
    pub diffs: Vec<CaseDiff>,
    pub stability: Vec<CaseStability>,
    pub baseline_absent: bool,
    /// Set when the gate failed outright before any check ran.
    pub failure_reason: Option<String>,
}

impl GateReport {
    /// The process exit code mirrors the verdict.
    pub fn exit_code(&self) -> i32 {
        if self.verdict_pass {
            0
        } else {
            1
        }
    }
}

/// Apply thresholds and per-case minima to the current summary, plus the
/// baseline-relative checks when a baseline exists.
pub fn evaluate(
    current: &RunSummary,
    baseline: Option<&BaselineSummary>,
    rules: &Ruleset,
    cases: &[Case],
    stability: Vec<CaseStability>,
) -> GateReport {
    if current.is_empty() {
        return GateReport {
            verdict_pass: false,
            checks: Vec::new(),
            diffs: Vec::new(),
            stability,
            baseline_absent: baseline.is_none(),
            failure_reason: Some("no records for run_id".to_string()),
        };
    }

    let mut checks = Vec::new();

    // 1. S1 floor. Vacuously true when the suite has no S1 cases.
    if current.s1.n_attempts == 0 {
        checks.push(GateCheck::new("S1 pass rate", true, "no S1 cases (skip)"));
    } else {
        checks.push(GateCheck::new(
            "S1 pass rate",
            current.s1.pass_rate >= rules.s1_min_pass_rate,
            format!(
                "{}/{} passed ({:.2} vs floor {:.2})",
                current.s1.n_pass, current.s1.n_attempts, current.s1.pass_rate, rules.s1_min_pass_rate
            ),
        ));
    }

    // 2. Overall floor.
    checks.push(GateCheck::new(
        "Overall pass rate",
        current.total.pass_rate >= rules.overall_min_pass_rate,
        format!(
            "{}/{} passed ({:.2} vs floor {:.2})",
            current.total.n_pass,
            current.total.n_attempts,
            current.total.pass_rate,
            rules.overall_min_pass_rate
        ),
    ));

    // 3. Per-case floors, for cases that actually ran in this window.
    let mut floored: Vec<&Case> = cases
        .iter()
        .filter(|c| c.effective_min_pass_rate().is_some())
        .filter(|c| current.per_case.contains_key(&c.case_id))
        .collect();
    floored.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.case_id.cmp(&b.case_id)));
    for case in floored {
        let floor = case.effective_min_pass_rate().expect("filtered above");
        let stats = &current.per_case[&case.case_id];
        checks.push(GateCheck::new(
            format!("Case {} min pass rate", case.case_id),
            stats.pass_rate >= floor,
            format!(
                "{}/{} passed ({:.2} vs floor {:.2})",
                stats.passes, stats.attempts, stats.pass_rate, floor
            ),
        ));
    }

    // 4-7. Baseline-relative checks.
    let mut diffs = Vec::new();
    let baseline_absent = baseline.is_none();
    if let Some(baseline) = baseline {
        diffs = diff_cases(current, &baseline.summary, rules);

        if rules.fail_on_new_regression {
            let regressed: Vec<&str> = diffs
                .iter()
                .filter(|d| d.has(DiffStatus::RegressedNew))
                .map(|d| d.case_id.as_str())
                .collect();
            checks.push(GateCheck::new(
                "New regressions",
                regressed.is_empty(),
                if regressed.is_empty() {
                    "none".to_string()
                } else {
                    regressed.join(", ")
                },
            ));
        }

        let worst_delta = current
            .per_case
            .iter()
            .filter_map(|(case_id, cur)| {
                baseline
                    .summary
                    .per_case
                    .get(case_id)
                    .map(|base| base.pass_rate - cur.pass_rate)
            })
            .fold(0.0_f64, f64::max);
        checks.push(GateCheck::new(
            "Worst-case delta",
            worst_delta <= rules.max_worst_case_delta + 1e-9,
            format!(
                "max pass-rate drop {:.2} vs limit {:.2}",
                worst_delta, rules.max_worst_case_delta
            ),
        ));

        for (name, status) in [
            ("Latency p95 ceiling", DiffStatus::LatencySpike),
            ("Token ceiling", DiffStatus::TokenInflation),
        ] {
            let hits: Vec<&str> = diffs
                .iter()
                .filter(|d| d.has(status))
                .map(|d| d.case_id.as_str())
                .collect();
            checks.push(GateCheck::new(
                name,
                hits.is_empty(),
                if hits.is_empty() {
                    "none".to_string()
                } else {
                    hits.join(", ")
                },
            ));
        }
    }

    GateReport {
        verdict_pass: checks.iter().all(|c| c.passed),
        checks,
        diffs,
        stability,
        baseline_absent,
        failure_reason: None,
    }
}
