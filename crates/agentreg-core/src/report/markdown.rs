use crate::diff::DiffStatus;
use crate::flakiness::CaseStability;
use crate::gate::GateReport;

/// Render the gate verdict as Markdown suitable for a PR comment or
/// `$GITHUB_STEP_SUMMARY`. Output is deterministic for identical reports.
pub fn render_gate_report(report: &GateReport) -> String {
    let mut md = String::new();

    md.push_str("## Agent Regression Gate\n\n");
    let verdict = if report.verdict_pass { "✅ PASS" } else { "❌ FAIL" };
    md.push_str(&format!("**Verdict: {}**\n", verdict));

    if let Some(reason) = &report.failure_reason {
        md.push_str(&format!("\n**Error:** {}\n", reason));
    }

    if report.baseline_absent {
        md.push_str(
            "\n> **Note:** no baseline records found; baseline comparison was skipped \
             and only floor checks were evaluated.\n",
        );
    }

    if !report.checks.is_empty() {
        md.push_str("\n| Check | Result | Detail |\n|---|---|---|\n");
        for check in &report.checks {
            let icon = if check.passed { "✅" } else { "❌" };
            md.push_str(&format!("| {} | {} | {} |\n", check.name, icon, check.detail));
        }
    }

    let explanations: Vec<_> = report
        .diffs
        .iter()
        .filter(|d| !matches!(d.status(), DiffStatus::Stable | DiffStatus::Improved))
        .collect();
    if !explanations.is_empty() {
        md.push_str("\n### Failure Explanations\n\n");
        md.push_str("| Case | Sev | Type | Explanation |\n|---|---|---|---|\n");
        for d in explanations {
            let ft = d
                .current_failure_type
                .map(|f| f.to_string())
                .unwrap_or_else(|| "-".to_string());
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                d.case_id, d.severity, ft, d.explanation
            ));
        }
    }

    if !report.stability.is_empty() {
        md.push_str(&render_stability(&report.stability));
    }

    md
}

fn render_stability(stability: &[CaseStability]) -> String {
    let mut rows: Vec<&CaseStability> = stability.iter().collect();
    rows.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.case_id.cmp(&b.case_id)));

    let flaky_count = rows.iter().filter(|s| s.flaky).count();
    let mut md = String::new();
    md.push_str("\n### Stability Report\n\n");
    md.push_str(&format!(
        "Analysed {} repeated case(s), {} flaky 🎲\n\n",
        rows.len(),
        flaky_count
    ));
    md.push_str("| Case | Sev | Attempts | Pass Rate | Flaky | Failure Types | Latency CV |\n");
    md.push_str("|---|---|---|---|---|---|---|\n");
    for s in rows {
        let flaky = if s.flaky { "🎲" } else { "✅" };
        let kinds = if s.failure_types.is_empty() {
            "-".to_string()
        } else {
            s.failure_types
                .iter()
                .map(|f| f.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        md.push_str(&format!(
            "| {} | {} | {} | {:.2} ({}/{}) | {} | {} | {:.2} |\n",
            s.case_id, s.severity, s.attempts, s.pass_rate, s.passes, s.attempts, flaky, kinds, s.latency_cv
        ));
    }
    md
}
