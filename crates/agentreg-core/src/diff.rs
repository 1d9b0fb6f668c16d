use crate::aggregate::{CaseStats, RunSummary};
use crate::config::Ruleset;
use crate::model::{FailureType, Severity};
use serde::Serialize;
use std::collections::BTreeSet;

/// Per-case regression category. A case may accrue several; the canonical
/// order below fixes both the primary status and the explanation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    RegressedNew,
    RegressedTypeChange,
    SchemaDiverged,
    LatencySpike,
    TokenInflation,
    Improved,
    Unseen,
    Stable,
}

impl DiffStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffStatus::RegressedNew => "regressed_new",
            DiffStatus::RegressedTypeChange => "regressed_type_change",
            DiffStatus::SchemaDiverged => "schema_diverged",
            DiffStatus::LatencySpike => "latency_spike",
            DiffStatus::TokenInflation => "token_inflation",
            DiffStatus::Improved => "improved",
            DiffStatus::Unseen => "unseen",
            DiffStatus::Stable => "stable",
        }
    }
}

impl std::fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct CaseDiff {
    pub case_id: String,
    pub severity: Severity,
    pub current_failure_type: Option<FailureType>,
    /// Accrued statuses in canonical order; never empty.
    pub statuses: Vec<DiffStatus>,
    /// Deterministic, byte-reproducible summary of the triggering facts.
    pub explanation: String,
}

impl CaseDiff {
    /// Primary status: the first accrued one in canonical order.
    pub fn status(&self) -> DiffStatus {
        self.statuses[0]
    }

    pub fn has(&self, status: DiffStatus) -> bool {
        self.statuses.contains(&status)
    }
}

/// Compare current per-case aggregates against the baseline. Every case
/// present in either summary gets one entry, sorted `(severity desc,
/// case_id asc)` for stable rendering.
pub fn diff_cases(current: &RunSummary, baseline: &RunSummary, rules: &Ruleset) -> Vec<CaseDiff> {
    let case_ids: BTreeSet<&String> =
        current.per_case.keys().chain(baseline.per_case.keys()).collect();

    let mut diffs: Vec<CaseDiff> = case_ids
        .into_iter()
        .map(|case_id| {
            let cur = current.per_case.get(case_id);
            let base = baseline.per_case.get(case_id);
            diff_one(case_id, cur, base, rules)
        })
        .collect();

    diffs.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.case_id.cmp(&b.case_id)));
    diffs
}

fn diff_one(
    case_id: &str,
    cur: Option<&CaseStats>,
    base: Option<&CaseStats>,
    rules: &Ruleset,
) -> CaseDiff {
    let mut statuses = Vec::new();
    let mut parts: Vec<String> = Vec::new();

    if let (Some(cur), Some(base)) = (cur, base) {
        let cur_failures = cur.attempts - cur.passes;

        if base.attempts > 0 && base.passes == base.attempts && cur_failures > 0 {
            statuses.push(DiffStatus::RegressedNew);
            parts.push(format!(
                "new regression: baseline {}/{} passed, current {} failure(s)",
                base.passes, base.attempts, cur_failures
            ));
        }

        if let (Some(cur_ft), Some(base_ft)) =
            (cur.dominant_failure_type, base.dominant_failure_type)
        {
            if cur_ft != base_ft {
                statuses.push(DiffStatus::RegressedTypeChange);
                parts.push(format!("failure type changed: {} -> {}", base_ft, cur_ft));
            }
        }

        let structural = [FailureType::SchemaMismatch, FailureType::BadJson];
        let cur_structural: Vec<FailureType> = structural
            .iter()
            .copied()
            .filter(|ft| cur.failure_kinds.contains_key(ft))
            .collect();
        let base_has_structural =
            structural.iter().any(|ft| base.failure_kinds.contains_key(ft));
        if !cur_structural.is_empty() && !base_has_structural {
            statuses.push(DiffStatus::SchemaDiverged);
            let kinds: Vec<&str> = cur_structural.iter().map(|ft| ft.as_str()).collect();
            parts.push(format!("schema divergence: new {} failures", kinds.join("/")));
        }

        if cur.latency_p95 > 0.0 && base.latency_p95 > 0.0 {
            let ratio = cur.latency_p95 / base.latency_p95;
            if ratio > rules.latency_p95_max_ratio {
                statuses.push(DiffStatus::LatencySpike);
                parts.push(format!(
                    "latency spike: p95 {:.1}ms vs baseline {:.1}ms ({:.2}x > {:.2}x limit)",
                    cur.latency_p95, base.latency_p95, ratio, rules.latency_p95_max_ratio
                ));
            }
        }

        if cur.median_tokens > 0.0 && base.median_tokens > 0.0 {
            let ratio = cur.median_tokens / base.median_tokens;
            if ratio > rules.token_delta_max_ratio {
                statuses.push(DiffStatus::TokenInflation);
                parts.push(format!(
                    "token inflation: median {:.0} vs baseline {:.0} ({:.2}x > {:.2}x limit)",
                    cur.median_tokens, base.median_tokens, ratio, rules.token_delta_max_ratio
                ));
            }
        }

        // The gain must be worth at least one attempt at the current
        // sample size, not a rounding artifact.
        let gain = cur.pass_rate - base.pass_rate;
        if gain > 0.0 && gain * cur.attempts as f64 >= 1.0 - 1e-9 {
            statuses.push(DiffStatus::Improved);
            parts.push(format!(
                "improved: pass rate {:.2} -> {:.2}",
                base.pass_rate, cur.pass_rate
            ));
        }
    } else if cur.is_some() {
        statuses.push(DiffStatus::Unseen);
        parts.push("no baseline data for this case".to_string());
    }

    if statuses.is_empty() {
        statuses.push(DiffStatus::Stable);
        parts.push("stable".to_string());
    }

    CaseDiff {
        case_id: case_id.to_string(),
        severity: cur.or(base).map(|s| s.severity).unwrap_or(Severity::S2),
        current_failure_type: cur.and_then(|s| s.dominant_failure_type),
        statuses,
        explanation: parts.join("; "),
    }
}
