//! Chat log rows and conversation aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Stored chat turn.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatLog {
    pub log_id: i64,
    pub session_id: String,
    pub user_message: String,
    pub bot_response: String,
    pub category: Option<String>,
    pub product_context: Option<String>,
    pub response_time_ms: Option<i32>,
    pub user_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub is_resolved: bool,
    pub feedback: Option<i32>,
}

impl ChatLog {
    /// Whether this turn carried product recommendations.
    pub fn has_product_context(&self) -> bool {
        self.product_context
            .as_deref()
            .map(|c| !c.is_empty() && c != "[]")
            .unwrap_or(false)
    }
}

/// Input for inserting a chat turn.
#[derive(Debug, Clone)]
pub struct NewChatLog {
    pub session_id: String,
    pub user_message: String,
    pub bot_response: String,
    pub category: Option<String>,
    pub product_context: Option<String>,
    pub response_time_ms: Option<i32>,
    pub user_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Per-conversation aggregate used by the listing endpoint.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub message_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    pub category: Option<String>,
}
