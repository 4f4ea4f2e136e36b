//! Chat model orchestration with a cooldown circuit breaker.
//!
//! Wraps the configured provider so a flapping upstream degrades to a
//! canned fallback instead of failing the request: after a provider error
//! the breaker stays open for a fixed cooldown and every chat short-circuits
//! to the fallback text.

use crate::services::metrics;
use crate::services::providers::{ChatProvider, ProviderError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Instant;

/// Default breaker cooldown after an upstream failure.
pub const DEFAULT_COOLDOWN_SECONDS: i64 = 300;

const FALLBACK_RESPONSE: &str = "I'm sorry, but I'm experiencing technical difficulties right \
     now. Please try again in a few minutes, or contact support directly for immediate help \
     with your farming needs. You can also browse the product catalog while I'm being restored.";

/// Outcome status of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStatus {
    Success,
    ServiceUnavailable,
    CircuitBreakerOpen,
    ServiceFailed,
}

impl ChatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatStatus::Success => "success",
            ChatStatus::ServiceUnavailable => "service_unavailable",
            ChatStatus::CircuitBreakerOpen => "circuit_breaker_open",
            ChatStatus::ServiceFailed => "service_failed",
        }
    }
}

/// A chat turn result, degraded or not.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub response: String,
    pub provider: &'static str,
    pub status: ChatStatus,
    pub input_tokens: i32,
    pub output_tokens: i32,
}

/// Provider wrapper with failure cooldown.
pub struct LlmService {
    provider: Option<Arc<dyn ChatProvider>>,
    last_failure: Mutex<Option<DateTime<Utc>>>,
    cooldown: ChronoDuration,
}

impl LlmService {
    pub fn new(provider: Option<Arc<dyn ChatProvider>>) -> Self {
        Self::with_cooldown(provider, DEFAULT_COOLDOWN_SECONDS)
    }

    pub fn with_cooldown(provider: Option<Arc<dyn ChatProvider>>, cooldown_seconds: i64) -> Self {
        Self {
            provider,
            last_failure: Mutex::new(None),
            cooldown: ChronoDuration::seconds(cooldown_seconds),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn model(&self) -> Option<String> {
        self.provider.as_ref().map(|p| p.model().to_string())
    }

    /// Whether the breaker is currently open.
    pub fn is_circuit_open(&self) -> bool {
        let last_failure = self.last_failure.lock().expect("breaker lock poisoned");
        match *last_failure {
            Some(at) => Utc::now() - at < self.cooldown,
            None => false,
        }
    }

    pub fn last_failure(&self) -> Option<DateTime<Utc>> {
        *self.last_failure.lock().expect("breaker lock poisoned")
    }

    /// Close the breaker so the next request goes upstream again.
    pub fn reset_circuit_breaker(&self) {
        *self.last_failure.lock().expect("breaker lock poisoned") = None;
        tracing::info!("Chat provider circuit breaker reset");
    }

    fn record_failure(&self, error: &ProviderError) {
        metrics::LLM_ERRORS_TOTAL
            .with_label_values(&[error.kind()])
            .inc();
        *self.last_failure.lock().expect("breaker lock poisoned") = Some(Utc::now());
    }

    fn fallback(status: ChatStatus) -> ChatOutcome {
        ChatOutcome {
            response: FALLBACK_RESPONSE.to_string(),
            provider: "fallback",
            status,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    /// Run one chat turn with the assembled system prompt. Never fails:
    /// upstream errors degrade to the fallback text.
    pub async fn chat(&self, system_prompt: &str, message: &str) -> ChatOutcome {
        let Some(provider) = &self.provider else {
            return Self::fallback(ChatStatus::ServiceUnavailable);
        };

        if self.is_circuit_open() {
            tracing::warn!("Circuit breaker open, serving fallback response");
            return Self::fallback(ChatStatus::CircuitBreakerOpen);
        }

        let started = Instant::now();
        match provider.chat(Some(system_prompt), message).await {
            Ok(completion) => {
                metrics::LLM_REQUEST_DURATION
                    .with_label_values(&[provider.model()])
                    .observe(started.elapsed().as_secs_f64());
                metrics::CHAT_TOKENS_TOTAL
                    .with_label_values(&[provider.model(), "input"])
                    .inc_by(completion.input_tokens.max(0) as f64);
                metrics::CHAT_TOKENS_TOTAL
                    .with_label_values(&[provider.model(), "output"])
                    .inc_by(completion.output_tokens.max(0) as f64);

                *self.last_failure.lock().expect("breaker lock poisoned") = None;

                ChatOutcome {
                    response: completion.text,
                    provider: "openai",
                    status: ChatStatus::Success,
                    input_tokens: completion.input_tokens,
                    output_tokens: completion.output_tokens,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Chat provider request failed");
                self.record_failure(&e);
                Self::fallback(ChatStatus::ServiceFailed)
            }
        }
    }

    /// Connectivity probe for the admin status endpoint.
    pub async fn test_connectivity(&self) -> serde_json::Value {
        let Some(provider) = &self.provider else {
            return json!({ "status": "not_configured" });
        };

        match provider.health_check().await {
            Ok(()) => json!({
                "status": "connected",
                "model": provider.model(),
            }),
            Err(e) => json!({
                "status": "failed",
                "error": e.to_string(),
            }),
        }
    }
}
