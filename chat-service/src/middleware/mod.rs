pub mod auth;
pub mod metrics;

pub use auth::{admin_auth_middleware, api_key_auth_middleware};
pub use metrics::request_metrics_middleware;
