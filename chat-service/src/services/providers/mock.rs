//! Mock provider for testing.

use super::{ChatCompletion, ChatProvider, ProviderError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// Mock chat provider. Echoes a canned response and can be flipped into a
/// failing state to drive circuit-breaker paths.
pub struct MockChatProvider {
    failing: AtomicBool,
}

impl MockChatProvider {
    pub fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for MockChatProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn chat(
        &self,
        system_prompt: Option<&str>,
        message: &str,
    ) -> Result<ChatCompletion, ProviderError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::ApiError("mock failure".to_string()));
        }

        let prompt_len = system_prompt.map(|p| p.len()).unwrap_or(0);

        Ok(ChatCompletion {
            text: format!("Mock response for: {}", message),
            input_tokens: ((prompt_len + message.len()) / 4) as i32,
            output_tokens: 10,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ProviderError::ApiError("mock failure".to_string()))
        } else {
            Ok(())
        }
    }

    fn model(&self) -> &str {
        "mock-chat"
    }
}
