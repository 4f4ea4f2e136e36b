pub mod context;
pub mod database;
pub mod llm;
pub mod metrics;
pub mod monitor;
pub mod prompt;
pub mod providers;
pub mod retrieval;

pub use database::Database;
pub use llm::LlmService;
pub use monitor::RequestMonitor;
