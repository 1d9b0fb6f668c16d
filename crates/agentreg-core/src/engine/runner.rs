use crate::engine::invoker::{AgentInvoker, InvokerResponse};
use crate::model::{Case, Expectation, FailureType, Record};
use crate::storage::RecordStore;
use anyhow::Result;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Duration};

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// How many times the whole suite is executed (flakiness repetition).
    pub repeat: u32,
    /// Bound on in-flight invocations.
    pub concurrency: usize,
    /// Hard per-item deadline.
    pub timeout: Duration,
    /// Cooperative cancellation, checked between work items. An in-flight
    /// invocation is never interrupted.
    pub cancel: Arc<AtomicBool>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            repeat: 1,
            concurrency: 4,
            timeout: Duration::from_secs(30),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    /// One record per completed work item, in completion order. Items whose
    /// disk write failed are folded in as `provider_error` failures so they
    /// never drop silently from the summary.
    pub records: Vec<Record>,
    pub write_failures: usize,
    pub cancelled: bool,
}

impl RunOutcome {
    pub fn all_passed(&self) -> bool {
        self.records.iter().all(|r| r.passed)
    }
}

/// Executes cases against the injected agent capability and persists one
/// record per item. Pure with respect to its inputs apart from the store
/// and whatever the invoker does.
pub struct Runner {
    store: RecordStore,
    invoker: Arc<dyn AgentInvoker>,
}

impl Runner {
    pub fn new(store: RecordStore, invoker: Arc<dyn AgentInvoker>) -> Self {
        Self { store, invoker }
    }

    /// Expand `cases × repeat` work items (case order preserved within each
    /// repetition), dispatch them through a bounded pool, classify outcomes,
    /// and append records.
    pub async fn run(&self, cases: &[Case], run_id: &str, opts: &RunOptions) -> Result<RunOutcome> {
        let sem = Arc::new(Semaphore::new(opts.concurrency.max(1)));
        let mut handles = Vec::new();
        let mut cancelled = false;

        'dispatch: for rep in 0..opts.repeat.max(1) {
            for case in cases {
                if opts.cancel.load(Ordering::Relaxed) {
                    cancelled = true;
                    break 'dispatch;
                }
                let permit = sem.clone().acquire_owned().await?;
                let invoker = Arc::clone(&self.invoker);
                let store = self.store.clone();
                let case = case.clone();
                let run_id = run_id.to_string();
                let deadline = opts.timeout;
                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    run_item(invoker.as_ref(), &store, &case, &run_id, rep, deadline).await
                }));
            }
        }

        let mut records = Vec::new();
        let mut write_failures = 0;
        for h in handles {
            match h.await {
                Ok((record, wrote)) => {
                    if !wrote {
                        write_failures += 1;
                    }
                    records.push(record);
                }
                Err(e) => tracing::error!(error = %e, "worker task panicked"),
            }
        }

        Ok(RunOutcome {
            records,
            write_failures,
            cancelled,
        })
    }
}

async fn run_item(
    invoker: &dyn AgentInvoker,
    store: &RecordStore,
    case: &Case,
    run_id: &str,
    attempt_index: u32,
    deadline: Duration,
) -> (Record, bool) {
    let started = std::time::Instant::now();
    let outcome = timeout(deadline, invoker.invoke(case)).await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    let mut record = Record {
        run_id: run_id.to_string(),
        case_id: case.case_id.clone(),
        severity: case.severity,
        timestamp: Utc::now(),
        passed: false,
        failure_type: None,
        latency_ms: elapsed_ms,
        cost: 0.0,
        tokens_total: 0,
        output_text: String::new(),
        output_json: None,
        attempt_index,
    };

    match outcome {
        Err(_) => {
            record.failure_type = Some(FailureType::Timeout);
        }
        Ok(Err(e)) => {
            tracing::warn!(case_id = %case.case_id, error = %e, "invoker failed");
            record.failure_type = Some(FailureType::ProviderError);
        }
        Ok(Ok(resp)) => {
            let (passed, failure_type, output_json) = classify(case, &resp);
            record.passed = passed;
            record.failure_type = failure_type;
            record.output_json = output_json;
            record.output_text = resp.text;
            record.tokens_total = resp.tokens_total;
            record.cost = resp.cost;
            if resp.latency_ms > 0.0 {
                record.latency_ms = resp.latency_ms;
            }
        }
    }

    let wrote = match store.append(&record) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("record write failed for {}: {e:#}", case.case_id);
            record.passed = false;
            record.failure_type = Some(FailureType::ProviderError);
            false
        }
    };
    (record, wrote)
}

/// Classify a completed invocation against the case expectation.
fn classify(
    case: &Case,
    resp: &InvokerResponse,
) -> (bool, Option<FailureType>, Option<serde_json::Value>) {
    match case.expectation() {
        Expectation::Schema(fragment) => {
            let parsed = resp
                .json
                .clone()
                .or_else(|| serde_json::from_str(resp.text.trim()).ok());
            match parsed {
                None => (false, Some(FailureType::BadJson), None),
                Some(value) => {
                    if contract_violation(&fragment, &value).is_none() {
                        (true, None, Some(value))
                    } else {
                        (false, Some(FailureType::SchemaMismatch), Some(value))
                    }
                }
            }
        }
        Expectation::Literal(target) => {
            if resp.text.trim() == target {
                (true, None, None)
            } else {
                (false, Some(FailureType::QualityFail), None)
            }
        }
        Expectation::None => (true, None, None),
    }
}

/// A schema fragment declares required top-level keys and their value types.
/// Missing keys, extra keys, and wrong types are all violations. Int and
/// float are interchangeable (both JSON numbers); bool never coerces.
fn contract_violation(
    fragment: &serde_json::Map<String, serde_json::Value>,
    actual: &serde_json::Value,
) -> Option<String> {
    let obj = match actual.as_object() {
        Some(o) => o,
        None => return Some(format!("expected an object, got {}", json_type(actual))),
    };

    let missing: Vec<&str> = fragment
        .keys()
        .filter(|k| !obj.contains_key(*k))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Some(format!("missing keys: {}", missing.join(", ")));
    }

    let extra: Vec<&str> = obj
        .keys()
        .filter(|k| !fragment.contains_key(*k))
        .map(String::as_str)
        .collect();
    if !extra.is_empty() {
        return Some(format!("extra keys: {}", extra.join(", ")));
    }

    for (key, expected) in fragment {
        let got = &obj[key];
        if json_type(expected) != json_type(got) {
            return Some(format!(
                "{}: expected {}, got {}",
                key,
                json_type(expected),
                json_type(got)
            ));
        }
    }
    None
}

fn json_type(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;
    use std::collections::BTreeSet;

    fn case(expected: &str) -> Case {
        Case {
            case_id: "TC001".into(),
            name: "t".into(),
            input_prompt: "p".into(),
            expected_output: expected.into(),
            severity: Severity::S1,
            owner: None,
            tags: BTreeSet::new(),
            min_pass_rate: None,
            category: None,
        }
    }

    fn resp(text: &str, json: Option<serde_json::Value>) -> InvokerResponse {
        InvokerResponse {
            text: text.into(),
            json,
            tokens_total: 10,
            cost: 0.0,
            latency_ms: 1.0,
        }
    }

    #[test]
    fn unparseable_json_is_bad_json() {
        let (passed, ft, _) = classify(&case(r#"{"a": 1}"#), &resp("not json", None));
        assert!(!passed);
        assert_eq!(ft, Some(FailureType::BadJson));
    }

    #[test]
    fn missing_key_is_schema_mismatch() {
        let (passed, ft, _) = classify(&case(r#"{"a": 1, "b": "x"}"#), &resp(r#"{"a": 2}"#, None));
        assert!(!passed);
        assert_eq!(ft, Some(FailureType::SchemaMismatch));
    }

    #[test]
    fn extra_key_is_schema_mismatch() {
        let (passed, ft, _) =
            classify(&case(r#"{"a": 1}"#), &resp(r#"{"a": 2, "b": 3}"#, None));
        assert!(!passed);
        assert_eq!(ft, Some(FailureType::SchemaMismatch));
    }

    #[test]
    fn wrong_type_is_schema_mismatch_but_numbers_interchange() {
        let fragment: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(r#"{"amount": 10, "flag": true}"#).unwrap();

        // Float satisfies an int-typed example value.
        assert!(contract_violation(
            &fragment,
            &serde_json::json!({"amount": 10.5, "flag": false})
        )
        .is_none());

        // Bool never coerces.
        let violation =
            contract_violation(&fragment, &serde_json::json!({"amount": 1, "flag": 1}));
        assert!(violation.unwrap().contains("flag"));
    }

    #[test]
    fn matching_contract_passes_and_keeps_json() {
        let (passed, ft, json) =
            classify(&case(r#"{"a": 1}"#), &resp(r#"{"a": 7}"#, None));
        assert!(passed);
        assert!(ft.is_none());
        assert_eq!(json, Some(serde_json::json!({"a": 7})));
    }

    #[test]
    fn literal_mismatch_is_quality_fail() {
        let (passed, ft, _) = classify(&case("Paris"), &resp("London", None));
        assert!(!passed);
        assert_eq!(ft, Some(FailureType::QualityFail));

        let (passed, ft, _) = classify(&case("Paris"), &resp("  Paris\n", None));
        assert!(passed);
        assert!(ft.is_none());
    }

    #[test]
    fn no_expectation_passes() {
        let (passed, ft, _) = classify(&case(""), &resp("", None));
        assert!(passed);
        assert!(ft.is_none());
    }
}
