use crate::model::{FailureType, Record, Severity};
use std::collections::BTreeMap;

/// Counts and pass rate over one slice of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SliceStats {
    pub n_attempts: u64,
    pub n_pass: u64,
    pub pass_rate: f64,
}

impl SliceStats {
    fn finish(n_attempts: u64, n_pass: u64) -> Self {
        let pass_rate = if n_attempts == 0 {
            0.0
        } else {
            n_pass as f64 / n_attempts as f64
        };
        Self {
            n_attempts,
            n_pass,
            pass_rate,
        }
    }
}

/// Per-case aggregates over a grouping of records.
#[derive(Debug, Clone)]
pub struct CaseStats {
    pub severity: Severity,
    pub attempts: u64,
    pub passes: u64,
    pub pass_rate: f64,
    pub failure_kinds: BTreeMap<FailureType, u64>,
    /// Mode of non-null failure types; ties break alphabetically on the
    /// wire string (the map iterates in that order).
    pub dominant_failure_type: Option<FailureType>,
    pub median_latency: f64,
    pub latency_p95: f64,
    pub median_cost: f64,
    pub median_tokens: f64,
    /// stddev/mean of latency; 0 when the mean is 0.
    pub latency_cv: f64,
}

/// Canonical summary of a grouping of records (one run or a date window).
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total: SliceStats,
    pub s1: SliceStats,
    pub s2: SliceStats,
    pub latency_p50: f64,
    pub latency_p95: f64,
    pub total_cost: f64,
    pub per_case: BTreeMap<String, CaseStats>,
}

impl RunSummary {
    pub fn is_empty(&self) -> bool {
        self.total.n_attempts == 0
    }
}

#[derive(Default)]
struct CaseAccum {
    severity: Option<Severity>,
    attempts: u64,
    passes: u64,
    failure_kinds: BTreeMap<FailureType, u64>,
    latencies: Vec<f64>,
    costs: Vec<f64>,
    tokens: Vec<f64>,
}

/// Order-independent streaming fold over records. Only the per-group value
/// buffers needed for quantiles are retained.
#[derive(Default)]
pub struct Aggregator {
    total: (u64, u64),
    s1: (u64, u64),
    s2: (u64, u64),
    latencies: Vec<f64>,
    total_cost: f64,
    cases: BTreeMap<String, CaseAccum>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, r: &Record) {
        let pass = u64::from(r.passed);
        self.total.0 += 1;
        self.total.1 += pass;
        match r.severity {
            Severity::S1 => {
                self.s1.0 += 1;
                self.s1.1 += pass;
            }
            Severity::S2 => {
                self.s2.0 += 1;
                self.s2.1 += pass;
            }
        }
        self.latencies.push(r.latency_ms);
        self.total_cost += r.cost;

        let acc = self.cases.entry(r.case_id.clone()).or_default();
        acc.severity.get_or_insert(r.severity);
        acc.attempts += 1;
        acc.passes += pass;
        if let Some(ft) = r.failure_type {
            *acc.failure_kinds.entry(ft).or_insert(0) += 1;
        }
        acc.latencies.push(r.latency_ms);
        acc.costs.push(r.cost);
        acc.tokens.push(r.tokens_total as f64);
    }

    pub fn finish(mut self) -> RunSummary {
        sort_f64(&mut self.latencies);

        let per_case = self
            .cases
            .into_iter()
            .map(|(case_id, mut acc)| {
                sort_f64(&mut acc.latencies);
                sort_f64(&mut acc.costs);
                sort_f64(&mut acc.tokens);

                let dominant = acc
                    .failure_kinds
                    .iter()
                    .min_by_key(|&(ft, count)| (std::cmp::Reverse(*count), *ft))
                    .map(|(ft, _)| *ft);

                let stats = CaseStats {
                    severity: acc.severity.unwrap_or(Severity::S2),
                    attempts: acc.attempts,
                    passes: acc.passes,
                    pass_rate: SliceStats::finish(acc.attempts, acc.passes).pass_rate,
                    dominant_failure_type: dominant,
                    failure_kinds: acc.failure_kinds,
                    median_latency: median(&acc.latencies),
                    latency_p95: percentile(&acc.latencies, 95.0),
                    median_cost: median(&acc.costs),
                    median_tokens: median(&acc.tokens),
                    latency_cv: coefficient_of_variation(&acc.latencies),
                };
                (case_id, stats)
            })
            .collect();

        RunSummary {
            total: SliceStats::finish(self.total.0, self.total.1),
            s1: SliceStats::finish(self.s1.0, self.s1.1),
            s2: SliceStats::finish(self.s2.0, self.s2.1),
            latency_p50: percentile(&self.latencies, 50.0),
            latency_p95: percentile(&self.latencies, 95.0),
            total_cost: self.total_cost,
            per_case,
        }
    }
}

/// Fold a whole slice of records in one call.
pub fn summarize(records: &[Record]) -> RunSummary {
    let mut agg = Aggregator::new();
    for r in records {
        agg.push(r);
    }
    agg.finish()
}

fn sort_f64(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

/// Nearest-rank percentile on a sorted slice.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Median of a sorted slice, averaging the two middle values.
pub fn median(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    let mid = n / 2;
    if n % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Population stddev / mean; 0 on an empty slice or a zero mean.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}
