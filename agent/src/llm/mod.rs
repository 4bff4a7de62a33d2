pub mod perplexity;

pub use perplexity::PerplexityClient;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;

/// Transport-level failure from the invocation layer. The pipeline does not
/// retry these; the entity is marked failed and its siblings continue.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("empty response")]
    Empty,
}

/// Narrow capability interface for one LLM call. Alternate providers slot in
/// without touching the retry pipeline.
#[async_trait]
pub trait LlmInvoker: Send + Sync {
    async fn invoke(&self, prompt: &str, temperature: f32) -> Result<String, InvokeError>;
}

/// Offline invoker for dry runs (SIMULATE_LLM=true). Emits a plausible
/// analysis payload, sometimes wrapped in a markdown fence with prose so the
/// extraction path gets exercised too.
pub struct SimulatedInvoker;

#[async_trait]
impl LlmInvoker for SimulatedInvoker {
    async fn invoke(&self, _prompt: &str, _temperature: f32) -> Result<String, InvokeError> {
        let (recommendation, estimated_return, confidence, fenced) = {
            let mut rng = rand::thread_rng();
            let recommendation = match rng.gen_range(0..3) {
                0 => "BUY",
                1 => "SELL",
                _ => "RETAIN",
            };
            (
                recommendation,
                rng.gen_range(-10.0..25.0_f64),
                rng.gen_range(0.55..0.95_f64),
                rng.gen_bool(0.5),
            )
        };

        let payload = serde_json::json!({
            "recommendation": recommendation,
            "estimated_return": (estimated_return * 10.0).round() / 10.0,
            "confidence": (confidence * 100.0).round() / 100.0,
            "risk_notes": "Simulated response; no market data consulted.",
            "sources": ["simulation"],
        });

        if fenced {
            Ok(format!(
                "Here is the analysis you asked for:\n```json\n{payload}\n```\nLet me know if you need more detail."
            ))
        } else {
            Ok(payload.to_string())
        }
    }
}
