use crate::model::{Case, Expectation};
use async_trait::async_trait;
use std::hash::{Hash, Hasher};

/// What one agent invocation produced. The runner classifies this against
/// the case expectation; the invoker never judges pass/fail itself.
#[derive(Debug, Clone, Default)]
pub struct InvokerResponse {
    pub text: String,
    pub json: Option<serde_json::Value>,
    pub tokens_total: u64,
    pub cost: f64,
    pub latency_ms: f64,
}

/// The single capability the core depends on: map a case to an outcome.
/// Mock and production agents are interchangeable implementations; the
/// engine never inspects which one it holds.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, case: &Case) -> anyhow::Result<InvokerResponse>;

    fn name(&self) -> &str {
        "agent"
    }
}

/// Deterministic offline invoker: same case, same response. Schema cases get
/// the expected object echoed back, literal cases get the target text, so a
/// healthy suite runs green without any external provider.
#[derive(Debug, Clone)]
pub struct MockInvoker {
    model: String,
}

impl MockInvoker {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AgentInvoker for MockInvoker {
    async fn invoke(&self, case: &Case) -> anyhow::Result<InvokerResponse> {
        // Simulated provider latency keeps the timing fields meaningful.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        case.input_prompt.hash(&mut hasher);
        let content_hash = hasher.finish();

        let (text, json) = match case.expectation() {
            Expectation::Schema(map) => {
                let value = serde_json::Value::Object(map);
                (value.to_string(), Some(value))
            }
            Expectation::Literal(target) => (target, None),
            Expectation::None => (format!("mock response {:016x}", content_hash), None),
        };

        let tokens_total = 50 + (case.input_prompt.len() as u64 + text.len() as u64) / 4;
        Ok(InvokerResponse {
            text,
            json,
            tokens_total,
            cost: tokens_total as f64 * 1.5e-6,
            latency_ms: 5.0,
        })
    }

    fn name(&self) -> &str {
        &self.model
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
            input_prompt: "emit payload".into(),
            expected_output: expected.into(),
            severity: Severity::S1,
            owner: None,
            tags: BTreeSet::new(),
            min_pass_rate: None,
            category: None,
        }
    }

    #[tokio::test]
    async fn mock_echoes_schema_cases() {
        let invoker = MockInvoker::new("gpt-4-mock");
        let resp = invoker.invoke(&case(r#"{"merchant_id": "m-1"}"#)).await.unwrap();
        assert_eq!(resp.json, Some(serde_json::json!({"merchant_id": "m-1"})));
        assert!(resp.tokens_total > 0);
    }

    #[tokio::test]
    async fn mock_is_deterministic_per_prompt() {
        let invoker = MockInvoker::new("gpt-4-mock");
        let a = invoker.invoke(&case("")).await.unwrap();
        let b = invoker.invoke(&case("")).await.unwrap();
        assert_eq!(a.text, b.text);
    }
}
