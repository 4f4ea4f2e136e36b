pub mod chat;

pub use chat::{
    ChatRequest, ChatResponse, ContextProduct, ConversationEntry, SessionContextUpdate,
    SessionInfo, UserContext,
};
