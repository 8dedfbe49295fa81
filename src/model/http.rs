use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChatMessage, LanguageModel};

/// Hard cap on one completion request, so a stalled connection surfaces as
/// an error instead of hanging the caller
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Chat-completion client for any OpenAI-compatible endpoint
///
/// Talks to `<base_url>/v1/chat/completions` with a bearer token. Errors on
/// non-success status or an empty choice list; retrying is the caller's job.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OpenAiChatModel {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: 0.7,
        };

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Chat completion request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Chat completion returned {}: {}",
                status,
                body.chars().take(500).collect::<String>()
            ));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .context("Failed to decode chat completion response")?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("Chat completion response contained no choices"))
    }

    fn name(&self) -> &str {
        &self.model
    }
}
