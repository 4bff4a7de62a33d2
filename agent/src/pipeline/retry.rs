use crate::llm::LlmInvoker;
use crate::pipeline::extract;
use crate::pipeline::prompt::{self, PromptContext};
use crate::pipeline::validate::{self, Shape};
use crate::types::{AnalysisResult, FieldIssue, IssueKind, ResultStatus, ValidationOutcome};
use serde_json::Value;
use tracing::{debug, warn};

/// Synthetic field name reported when no JSON could be extracted at all
pub const ENTIRE_PAYLOAD: &str = "entire payload";

/// Drives one entity from first prompt to a terminal state. Each step of the
/// bounded loop carries exactly the data it needs; terminal states return.
enum Step {
    Building,
    AwaitingResponse { prompt: String },
    Extracting { raw: String },
    Validating { raw: String, payload: Value },
    Retrying { raw: String, outcome: ValidationOutcome },
}

pub struct RetryController<'a> {
    invoker: &'a dyn LlmInvoker,
    max_retries: u32,
    temperature: f32,
}

impl<'a> RetryController<'a> {
    pub fn new(invoker: &'a dyn LlmInvoker, max_retries: u32, temperature: f32) -> Self {
        Self {
            invoker,
            // budget of 0 would never invoke; one attempt minimum
            max_retries: max_retries.max(1),
            temperature,
        }
    }

    /// Run the build -> invoke -> extract -> validate loop for one entity.
    /// At most `max_retries` invocations. Transport errors are not retried;
    /// they surface immediately as a distinct failure for this entity.
    pub async fn run(&self, ctx: &PromptContext<'_>, shape: Shape) -> AnalysisResult {
        let label = ctx.label().to_string();
        let mut attempt: u32 = 1;
        let mut step = Step::Building;

        loop {
            step = match step {
                Step::Building => Step::AwaitingResponse {
                    prompt: prompt::initial(ctx),
                },

                Step::AwaitingResponse { prompt } => {
                    match self.invoker.invoke(&prompt, self.temperature).await {
                        Ok(raw) => Step::Extracting { raw },
                        Err(e) => {
                            warn!("{label}: LLM invocation failed on attempt {attempt}: {e}");
                            return AnalysisResult::failed(
                                &label,
                                ResultStatus::InvocationFailed,
                                format!("llm invocation: {e}"),
                                Vec::new(),
                                attempt,
                            );
                        }
                    }
                }

                Step::Extracting { raw } => match extract::extract(&raw) {
                    Ok(payload) => Step::Validating { raw, payload },
                    Err(failure) => {
                        debug!("{label}: no JSON in attempt {attempt}");
                        let outcome = ValidationOutcome {
                            issues: vec![FieldIssue::new(ENTIRE_PAYLOAD, IssueKind::Missing)],
                        };
                        Step::Retrying {
                            raw: failure.raw,
                            outcome,
                        }
                    }
                },

                Step::Validating { raw, payload } => {
                    let outcome = validate::validate(&payload, shape);
                    if outcome.is_valid() {
                        debug!("{label}: accepted on attempt {attempt}");
                        return validate::to_result(&payload, &label, attempt);
                    }
                    debug!(
                        "{label}: attempt {attempt} invalid: {}",
                        outcome.field_names().join(", ")
                    );
                    Step::Retrying { raw, outcome }
                }

                Step::Retrying { raw, outcome } => {
                    if attempt >= self.max_retries {
                        warn!(
                            "{label}: exhausted after {attempt} attempts ({})",
                            outcome.field_names().join(", ")
                        );
                        return AnalysisResult::failed(
                            &label,
                            ResultStatus::Exhausted,
                            "validation did not succeed within the retry budget",
                            outcome.field_names(),
                            attempt,
                        );
                    }
                    attempt += 1;
                    Step::AwaitingResponse {
                        prompt: prompt::corrective(ctx, &raw, &outcome),
                    }
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::InvokeError;
    use crate::types::{Holding, Recommendation};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted invoker: pops one canned response per call, records prompts
    struct StubInvoker {
        responses: Mutex<VecDeque<Result<String, InvokeError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl StubInvoker {
        fn new(responses: Vec<Result<String, InvokeError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        fn prompt(&self, i: usize) -> String {
            self.prompts.lock().unwrap()[i].clone()
        }
    }

    #[async_trait]
    impl LlmInvoker for StubInvoker {
        async fn invoke(&self, prompt: &str, _temperature: f32) -> Result<String, InvokeError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(InvokeError::Empty))
        }
    }

    fn holding() -> Holding {
        Holding {
            symbol: "TCS".to_string(),
            company_name: Some("Tata Consultancy Services".to_string()),
            quantity: dec!(4),
            price: dec!(3800),
            value: dec!(15200),
            sector: Some("IT".to_string()),
            exchange: None,
            yesterday_price: None,
            variation_percent: None,
        }
    }

    const VALID: &str = r#"{"recommendation":"BUY","estimated_return":14.0,"confidence":0.8,"risk_notes":"ok","sources":["news"]}"#;

    #[tokio::test]
    async fn fenced_response_accepted_on_first_attempt() {
        let raw = format!("Here you go:\n```json\n{VALID}\n```");
        let stub = StubInvoker::new(vec![Ok(raw)]);
        let h = holding();
        let controller = RetryController::new(&stub, 3, 0.7);
        let result = controller
            .run(&PromptContext::Holding { holding: &h }, Shape::PerHolding)
            .await;

        assert!(result.is_accepted());
        assert_eq!(result.recommendation, Some(Recommendation::Buy));
        assert_eq!(result.attempts, 1);
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn prose_only_responses_exhaust_with_synthetic_field() {
        let stub = StubInvoker::new(vec![
            Ok("I think you should buy this stock".to_string()),
            Ok("Definitely a buy, trust me".to_string()),
            Ok("Still no JSON from me".to_string()),
        ]);
        let h = holding();
        let controller = RetryController::new(&stub, 3, 0.7);
        let result = controller
            .run(&PromptContext::Holding { holding: &h }, Shape::PerHolding)
            .await;

        assert_eq!(result.status, ResultStatus::Exhausted);
        assert!(result.missing_fields.contains(&ENTIRE_PAYLOAD.to_string()));
        assert_eq!(result.attempts, 3);
        // never exceeds max_retries + 1 invocations
        assert!(stub.calls() <= 4);
        assert_eq!(stub.calls(), 3);
    }

    #[tokio::test]
    async fn invalid_then_valid_uses_corrective_prompt() {
        let stub = StubInvoker::new(vec![
            Ok(r#"{"recommendation":"HOLD","confidence":0.8}"#.to_string()),
            Ok(VALID.to_string()),
        ]);
        let h = holding();
        let controller = RetryController::new(&stub, 3, 0.7);
        let result = controller
            .run(&PromptContext::Holding { holding: &h }, Shape::PerHolding)
            .await;

        assert!(result.is_accepted());
        assert_eq!(result.attempts, 2);
        // second prompt is the self-correction, naming the failing fields
        let second = stub.prompt(1);
        assert!(second.contains("PREVIOUS RESPONSE"));
        assert!(second.contains("recommendation: out of enum"));
        assert!(second.contains("risk_notes: missing"));
    }

    #[tokio::test]
    async fn transport_error_is_not_retried() {
        let stub = StubInvoker::new(vec![
            Err(InvokeError::Timeout),
            Ok(VALID.to_string()),
        ]);
        let h = holding();
        let controller = RetryController::new(&stub, 3, 0.7);
        let result = controller
            .run(&PromptContext::Holding { holding: &h }, Shape::PerHolding)
            .await;

        assert_eq!(result.status, ResultStatus::InvocationFailed);
        assert_eq!(stub.calls(), 1);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn exhaustion_keeps_last_outcome_diagnostics() {
        let invalid = r#"{"recommendation":"BUY","confidence":"high"}"#;
        let stub = StubInvoker::new(vec![
            Ok(invalid.to_string()),
            Ok(invalid.to_string()),
        ]);
        let h = holding();
        let controller = RetryController::new(&stub, 2, 0.7);
        let result = controller
            .run(&PromptContext::Holding { holding: &h }, Shape::PerHolding)
            .await;

        assert_eq!(result.status, ResultStatus::Exhausted);
        assert!(result.missing_fields.contains(&"confidence".to_string()));
        assert!(result.missing_fields.contains(&"risk_notes".to_string()));
        assert_eq!(result.attempts, 2);
    }
}
