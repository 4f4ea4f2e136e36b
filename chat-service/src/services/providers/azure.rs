//! Azure-hosted OpenAI chat-completions provider.
//!
//! Talks to a deployment-style endpoint:
//! `{endpoint}/openai/deployments/{model}/chat/completions?api-version=...`
//! authenticated with an `api-key` header.

use super::{ChatCompletion, ChatProvider, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Provider configuration.
#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub api_version: String,
    pub max_completion_tokens: i32,
    pub temperature: f32,
}

pub struct AzureOpenAiProvider {
    config: AzureOpenAiConfig,
    client: Client,
}

impl AzureOpenAiProvider {
    pub fn new(config: AzureOpenAiConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model,
            self.config.api_version
        )
    }
}

#[async_trait]
impl ChatProvider for AzureOpenAiProvider {
    async fn chat(
        &self,
        system_prompt: Option<&str>,
        message: &str,
    ) -> Result<ChatCompletion, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(prompt) = system_prompt {
            messages.push(Message {
                role: "system",
                content: prompt.to_string(),
            });
        }
        messages.push(Message {
            role: "user",
            content: message.to_string(),
        });

        let request = CompletionRequest {
            messages,
            max_tokens: self.config.max_completion_tokens,
            temperature: self.config.temperature,
        };

        tracing::debug!(
            model = %self.config.model,
            message_count = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.completions_url())
            .header("api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }
            if status.is_client_error() {
                return Err(ProviderError::InvalidRequest(format!(
                    "{}: {}",
                    status, error_text
                )));
            }
            return Err(ProviderError::ApiError(format!(
                "Chat API error {}: {}",
                status, error_text
            )));
        }

        let api_response: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        let text = api_response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|c| !c.is_empty())
            .ok_or(ProviderError::EmptyResponse)?;

        let usage = api_response.usage.unwrap_or_default();

        Ok(ChatCompletion {
            text,
            input_tokens: usage.prompt_tokens.unwrap_or(0),
            output_tokens: usage.completion_tokens.unwrap_or(0),
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.config.api_key.is_empty() || self.config.endpoint.is_empty() {
            return Err(ProviderError::NotConfigured(
                "Chat API credentials not configured".to_string(),
            ));
        }
        Ok(())
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest {
    messages: Vec<Message>,
    max_tokens: i32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    prompt_tokens: Option<i32>,
    completion_tokens: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_url_includes_deployment_and_version() {
        let provider = AzureOpenAiProvider::new(AzureOpenAiConfig {
            endpoint: "https://example.openai.azure.com/".to_string(),
            api_key: "key".to_string(),
            model: "gpt-35-turbo".to_string(),
            api_version: "2023-12-01-preview".to_string(),
            max_completion_tokens: 500,
            temperature: 0.7,
        });

        assert_eq!(
            provider.completions_url(),
            "https://example.openai.azure.com/openai/deployments/gpt-35-turbo/chat/completions?api-version=2023-12-01-preview"
        );
    }
}
