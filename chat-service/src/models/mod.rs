//! Data models for chat-service.

pub mod chat_log;
pub mod product;

pub use chat_log::{ChatLog, ConversationSummary, NewChatLog};
pub use product::Product;
