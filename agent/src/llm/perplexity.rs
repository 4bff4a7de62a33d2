use crate::llm::{InvokeError, LlmInvoker};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Perplexity chat-completions client (sonar family)
pub struct PerplexityClient {
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl PerplexityClient {
    pub fn new(api_key: &str, model: &str, max_tokens: u32) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(90))
                .build()
                .expect("HTTP client"),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[async_trait]
impl LlmInvoker for PerplexityClient {
    async fn invoke(&self, prompt: &str, temperature: f32) -> Result<String, InvokeError> {
        let req = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .client
            .post("https://api.perplexity.ai/chat/completions")
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InvokeError::Timeout
                } else {
                    InvokeError::Transport(format!("Perplexity API request: {e}"))
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(InvokeError::Transport(format!(
                "Perplexity API {status}: {}",
                crate::util::truncate(&body, 300)
            )));
        }

        let data: ChatResponse = resp
            .json()
            .await
            .map_err(|e| InvokeError::Transport(format!("Parse Perplexity response: {e}")))?;

        let text = data
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if text.is_empty() {
            return Err(InvokeError::Empty);
        }

        if let Some(usage) = data.usage {
            debug!(
                "Perplexity {}: {} tokens in, {} tokens out",
                self.model, usage.prompt_tokens, usage.completion_tokens
            );
        }

        Ok(text)
    }
}
