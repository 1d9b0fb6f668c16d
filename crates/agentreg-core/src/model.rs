use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Severity tier of a case. S1 is blocking, S2 is advisory by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    S1,
    S2,
}

impl Severity {
    /// Normalize a raw severity string. Upper-cases first, then accepts the
    /// historical aliases that appear in older suite files.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "S1" | "SEV1" | "1" | "CRITICAL" => Some(Severity::S1),
            "S2" | "SEV2" | "2" | "HIGH" => Some(Severity::S2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::S1 => "S1",
            Severity::S2 => "S2",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed failure taxonomy. Variants are declared in wire-string order so the
/// derived `Ord` breaks dominant-type ties alphabetically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    BadJson,
    Other,
    ProviderError,
    QualityFail,
    SchemaMismatch,
    Timeout,
}

impl FailureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::BadJson => "bad_json",
            FailureType::Other => "other",
            FailureType::ProviderError => "provider_error",
            FailureType::QualityFail => "quality_fail",
            FailureType::SchemaMismatch => "schema_mismatch",
            FailureType::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for FailureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declarative test input, loaded once from the suite file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub case_id: String,
    pub name: String,
    pub input_prompt: String,
    /// Empty string means "no expectation": any successful invocation passes.
    #[serde(default)]
    pub expected_output: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_pass_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// How a case's expected output is interpreted by the runner.
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    /// No expectation declared: a successful invocation passes.
    None,
    /// Exact-match target (trimmed comparison).
    Literal(String),
    /// JSON object fragment: required keys and value types.
    Schema(serde_json::Map<String, serde_json::Value>),
}

impl Case {
    /// Classify the expected output. A string that parses as a JSON object is
    /// a contract fragment; anything else non-empty is a literal target.
    pub fn expectation(&self) -> Expectation {
        let raw = self.expected_output.trim();
        if raw.is_empty() {
            return Expectation::None;
        }
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(raw) {
            return Expectation::Schema(map);
        }
        Expectation::Literal(raw.to_string())
    }

    /// The pass-rate floor enforced by the gate for this case, if any.
    /// S1 cases default to 1.0; S2 cases have no floor unless declared.
    pub fn effective_min_pass_rate(&self) -> Option<f64> {
        match (self.min_pass_rate, self.severity) {
            (Some(m), _) => Some(m),
            (None, Severity::S1) => Some(1.0),
            (None, Severity::S2) => None,
        }
    }
}

/// One persisted row per case execution. Immutable once written; readers
/// ignore unknown fields and default the optional ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub run_id: String,
    pub case_id: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub passed: bool,
    #[serde(default)]
    pub failure_type: Option<FailureType>,
    #[serde(default)]
    pub latency_ms: f64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub tokens_total: u64,
    #[serde(default)]
    pub output_text: String,
    #[serde(default)]
    pub output_json: Option<serde_json::Value>,
    #[serde(default)]
    pub attempt_index: u32,
}

impl Record {
    /// `passed == true` implies `failure_type == None`.
    pub fn invariant_holds(&self) -> bool {
        !self.passed || self.failure_type.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_aliases_normalize() {
        assert_eq!(Severity::parse("s1"), Some(Severity::S1));
        assert_eq!(Severity::parse("SEV2"), Some(Severity::S2));
        assert_eq!(Severity::parse("critical"), Some(Severity::S1));
        assert_eq!(Severity::parse("S3"), None);
        assert_eq!(Severity::parse(""), None);
    }

    #[test]
    fn failure_type_wire_strings() {
        let ft: FailureType = serde_json::from_str("\"schema_mismatch\"").unwrap();
        assert_eq!(ft, FailureType::SchemaMismatch);
        assert_eq!(serde_json::to_string(&FailureType::BadJson).unwrap(), "\"bad_json\"");
    }

    #[test]
    fn failure_type_orders_alphabetically() {
        let mut kinds = vec![
            FailureType::Timeout,
            FailureType::BadJson,
            FailureType::QualityFail,
        ];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![FailureType::BadJson, FailureType::QualityFail, FailureType::Timeout]
        );
    }

    #[test]
    fn expectation_classifies_schema_vs_literal() {
        let mut case = Case {
            case_id: "TC001".into(),
            name: "t".into(),
            input_prompt: "p".into(),
            expected_output: r#"{"merchant_id": "m-1", "amount": 10}"#.into(),
            severity: Severity::S1,
            owner: None,
            tags: BTreeSet::new(),
            min_pass_rate: None,
            category: None,
        };
        assert!(matches!(case.expectation(), Expectation::Schema(_)));

        case.expected_output = "Paris".into();
        assert!(matches!(case.expectation(), Expectation::Literal(_)));

        case.expected_output = "  ".into();
        assert_eq!(case.expectation(), Expectation::None);

        // A JSON array is not a contract fragment; it stays a literal target.
        case.expected_output = "[1, 2]".into();
        assert!(matches!(case.expectation(), Expectation::Literal(_)));
    }

    #[test]
    fn min_pass_rate_defaults_by_severity() {
        let mut case = Case {
            case_id: "TC001".into(),
            name: "t".into(),
            input_prompt: "p".into(),
            expected_output: String::new(),
            severity: Severity::S1,
            owner: None,
            tags: BTreeSet::new(),
            min_pass_rate: None,
            category: None,
        };
        assert_eq!(case.effective_min_pass_rate(), Some(1.0));

        case.severity = Severity::S2;
        assert_eq!(case.effective_min_pass_rate(), None);

        case.min_pass_rate = Some(0.8);
        assert_eq!(case.effective_min_pass_rate(), Some(0.8));
    }
}
