//! Request/response DTOs for the chat API.

use crate::models::Product;
use crate::services::context::MessageContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::collections::BTreeMap;
use validator::Validate;

/// Patterns rejected by input sanitization.
const DANGEROUS_PATTERNS: &[&str] = &[
    "<script",
    "</script>",
    "javascript:",
    "data:",
    "vbscript:",
    "onload=",
    "onerror=",
    "onclick=",
];

/// Chat message request.
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 1000, message = "Message must be 1-1000 characters"))]
    pub message: String,

    /// Conversation ID for session continuity.
    pub conversation_id: Option<String>,

    /// Additional caller-supplied context.
    #[serde(default)]
    pub user_context: UserContext,
}

/// Caller-supplied farming context, merged over the extracted one.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UserContext {
    pub crop_type: Option<String>,
    pub application_type: Option<String>,
    pub problem: Option<String>,
    pub product_name: Option<String>,
    pub growth_stage: Option<String>,
    pub location: Option<String>,
}

impl UserContext {
    /// Overlay these fields onto an extracted context. Caller-supplied
    /// values win.
    pub fn apply_to(&self, context: &mut MessageContext) {
        if self.crop_type.is_some() {
            context.crop = self.crop_type.clone();
        }
        if self.application_type.is_some() {
            context.application_type = self.application_type.clone();
        }
        if self.problem.is_some() {
            context.problem = self.problem.clone();
            context.ph_generic = false;
        }
        if self.product_name.is_some() {
            context.product_name = self.product_name.clone();
        }
        if self.growth_stage.is_some() {
            context.growth_stage = self.growth_stage.clone();
        }
        if self.location.is_some() {
            context.location = self.location.clone();
        }
    }
}

/// Chat response.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
    pub context_used: Vec<ContextProduct>,
    pub metadata: ChatMetadata,
    pub status: String,
}

/// Product reference echoed back in the response.
#[derive(Debug, Serialize)]
pub struct ContextProduct {
    pub product_name: String,
    pub crop: Option<String>,
    pub application_type: Option<String>,
    pub problem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<BTreeMap<&'static str, String>>,
}

impl ContextProduct {
    pub fn from_product(product: &Product) -> Self {
        let mut documents = BTreeMap::new();
        if let Some(url) = &product.directions {
            documents.insert("Product Directions", url.clone());
        }
        if let Some(url) = &product.label {
            documents.insert("Product Label", url.clone());
        }
        if let Some(url) = &product.msds {
            documents.insert("Safety Data", url.clone());
        }
        if let Some(url) = &product.tech_doc {
            documents.insert("Technical Document", url.clone());
        }

        Self {
            product_name: product.product_name.clone(),
            crop: product.crop.clone(),
            application_type: product.application_type.clone(),
            problem: product.problem.clone(),
            documents: if documents.is_empty() {
                None
            } else {
                Some(documents)
            },
        }
    }
}

/// Bookkeeping metadata for a chat turn.
#[derive(Debug, Serialize)]
pub struct ChatMetadata {
    pub response_time: f64,
    pub model_used: String,
    pub products_count: usize,
    pub context_extracted: MessageContext,
    pub conversation_context: MessageContext,
    pub combined_context: MessageContext,
    pub history_count: i64,
    pub timestamp: DateTime<Utc>,
}

/// Session information.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub conversation_id: String,
    pub session_active: bool,
    pub message_count: i64,
    pub last_activity: DateTime<Utc>,
    pub extracted_context: MessageContext,
    pub recommendations_given: i64,
}

/// Manual session context update (advanced integrations).
#[derive(Debug, Deserialize)]
pub struct SessionContextUpdate {
    pub conversation_id: String,
    pub context: UserContext,
}

/// One formatted history entry.
#[derive(Debug, Serialize)]
pub struct ConversationEntry {
    pub message_id: i64,
    pub user_message: String,
    pub ai_response: String,
    pub timestamp: DateTime<Utc>,
    pub category: Option<String>,
}

/// Sanitize a user message: trim, cap length, strip NUL bytes, reject
/// injection-looking content.
pub fn sanitize_message(text: &str, max_length: usize) -> Result<String, AppError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Invalid input: text must be a non-empty string"
        )));
    }
    if trimmed.len() > max_length {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Input too long: maximum {} characters allowed",
            max_length
        )));
    }

    let lower = trimmed.to_lowercase();
    for pattern in DANGEROUS_PATTERNS {
        if lower.contains(pattern) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid input: potentially dangerous content detected"
            )));
        }
    }

    Ok(trimmed.replace('\0', ""))
}

/// Conversation IDs are UUIDs or short opaque tokens.
pub fn validate_conversation_id(conversation_id: &str) -> bool {
    !conversation_id.is_empty()
        && conversation_id.len() <= 50
        && conversation_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::context::extract_context;

    #[test]
    fn sanitize_trims_and_passes_clean_input() {
        let out = sanitize_message("  hello world  ", 1000).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn sanitize_rejects_empty_input() {
        assert!(sanitize_message("   ", 1000).is_err());
    }

    #[test]
    fn sanitize_rejects_oversized_input() {
        let long = "a".repeat(1001);
        assert!(sanitize_message(&long, 1000).is_err());
    }

    #[test]
    fn sanitize_rejects_script_injection() {
        assert!(sanitize_message("<script>alert(1)</script>", 1000).is_err());
        assert!(sanitize_message("click javascript:void(0)", 1000).is_err());
    }

    #[test]
    fn sanitize_strips_null_bytes() {
        let out = sanitize_message("hel\0lo", 1000).unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn conversation_id_accepts_uuid_and_tokens() {
        assert!(validate_conversation_id(
            "550e8400-e29b-41d4-a716-446655440000"
        ));
        assert!(validate_conversation_id("session_123"));
        assert!(!validate_conversation_id(""));
        assert!(!validate_conversation_id("bad id with spaces"));
        assert!(!validate_conversation_id(&"x".repeat(51)));
    }

    #[test]
    fn user_context_overrides_extracted_fields() {
        let mut ctx = extract_context("help with my potato soil ph");
        assert!(ctx.ph_generic);

        let user = UserContext {
            crop_type: Some("Field Tobacco".to_string()),
            problem: Some("Soil Salinity".to_string()),
            growth_stage: Some("Flowering".to_string()),
            ..Default::default()
        };
        user.apply_to(&mut ctx);

        assert_eq!(ctx.crop.as_deref(), Some("Field Tobacco"));
        assert_eq!(ctx.problem.as_deref(), Some("Soil Salinity"));
        assert_eq!(ctx.growth_stage.as_deref(), Some("Flowering"));
        assert!(!ctx.ph_generic);
    }
}
