use reqwest::Client;
use anyhow::{Result, anyhow};

use crate::session::SendRequest;

/// HTTP client for the chat backend. Cheap to clone; handles are passed
/// into spawned tasks so network calls never block the event loop.
#[derive(Debug, Clone)]
pub struct ChatApi {
    client: Client,
    base_url: String,
}

impl ChatApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// POST the message (and the system prompt, when set) to `/send`.
    /// The reply is the plain-text response body.
    pub async fn send_message(&self, request: &SendRequest) -> Result<String> {
        let url = format!("{}/send", self.base_url);

        let mut form: Vec<(&str, &str)> = vec![("message", &request.message)];
        if let Some(prompt) = &request.system_prompt {
            form.push(("systemPrompt", prompt));
        }

        let response = self.client.post(&url).form(&form).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Send failed with status: {}", response.status()));
        }

        Ok(response.text().await?)
    }

    /// POST the conversation transcript to `/suggest-prompts`; the response
    /// is a JSON array of suggestion strings.
    pub async fn suggest_prompts(&self, conversation: &str) -> Result<Vec<String>> {
        let url = format!("{}/suggest-prompts", self.base_url);

        let response = self
            .client
            .post(&url)
            .form(&[("conversation", conversation)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Suggestion request failed with status: {}",
                response.status()
            ));
        }

        Ok(response.json().await?)
    }
}
