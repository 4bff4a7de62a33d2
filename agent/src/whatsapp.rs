use anyhow::Result;
use tracing::{debug, warn};

/// WhatsApp Business API sender. Template messages are required for
/// recipients outside the 24-hour session window, so a template name
/// switches the payload shape.
pub struct WhatsAppAlert {
    token: String,
    phone_id: String,
    api_url: String,
    template_name: String,
    language_code: String,
    client: reqwest::Client,
}

impl WhatsAppAlert {
    pub fn new(
        token: &str,
        phone_id: &str,
        api_url: &str,
        template_name: &str,
        language_code: &str,
    ) -> Self {
        Self {
            token: token.to_string(),
            phone_id: phone_id.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            template_name: template_name.to_string(),
            language_code: language_code.to_string(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("HTTP client"),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.token.is_empty() && !self.phone_id.is_empty()
    }

    /// Send a message to `recipient` (international format, digits only).
    /// Uses the approved template when one is configured, free-form text
    /// otherwise. No-op when unconfigured.
    pub async fn send_message(&self, recipient: &str, text: &str) -> Result<()> {
        if !self.is_configured() {
            return Ok(());
        }

        let url = format!("{}/{}/messages", self.api_url, self.phone_id);

        // Template messages must not carry preview_url
        let body = if self.template_name.is_empty() {
            serde_json::json!({
                "messaging_product": "whatsapp",
                "to": recipient,
                "type": "text",
                "text": { "body": text },
            })
        } else {
            serde_json::json!({
                "messaging_product": "whatsapp",
                "to": recipient,
                "type": "template",
                "template": {
                    "name": self.template_name,
                    "language": { "code": self.language_code },
                    "components": [{
                        "type": "body",
                        "parameters": [{ "type": "text", "text": text }],
                    }],
                },
            })
        };

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        if resp.status().is_success() {
            debug!("WhatsApp message sent to {recipient}");
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(
                "WhatsApp send failed {status}: {}",
                crate::util::truncate(&body, 200)
            );
        }

        Ok(())
    }
}
