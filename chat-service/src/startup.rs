//! Application startup and lifecycle management.
//!
//! Wires configuration, the database pool, the LLM provider and the HTTP
//! router, and owns the serve loop.

use crate::config::ChatConfig;
use crate::handlers;
use crate::middleware::{
    admin_auth_middleware, api_key_auth_middleware, request_metrics_middleware,
};
use crate::services::providers::azure::{AzureOpenAiConfig, AzureOpenAiProvider};
use crate::services::providers::ChatProvider;
use crate::services::{metrics, Database, LlmService, RequestMonitor};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::rate_limit::{
    create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter,
};
use service_core::middleware::security_headers::security_headers_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ChatConfig,
    pub db: Database,
    pub llm: Arc<LlmService>,
    pub monitor: Arc<RequestMonitor>,
    pub ip_rate_limiter: IpRateLimiter,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration, resolving the
    /// chat provider from it.
    pub async fn build(config: ChatConfig) -> Result<Self, AppError> {
        let provider: Option<Arc<dyn ChatProvider>> = if config.is_llm_configured() {
            let provider = AzureOpenAiProvider::new(AzureOpenAiConfig {
                endpoint: config.openai.endpoint.clone(),
                api_key: config.openai.api_key.clone(),
                model: config.openai.model.clone(),
                api_version: config.openai.api_version.clone(),
                max_completion_tokens: config.openai.max_completion_tokens,
                temperature: config.openai.temperature,
            });
            tracing::info!(model = %config.openai.model, "Initialized chat provider");
            Some(Arc::new(provider))
        } else {
            tracing::warn!("Chat provider not configured, serving fallback responses");
            None
        };

        Self::build_with_provider(config, provider).await
    }

    /// Build with an explicit provider (mock in tests).
    pub async fn build_with_provider(
        config: ChatConfig,
        provider: Option<Arc<dyn ChatProvider>>,
    ) -> Result<Self, AppError> {
        metrics::init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to PostgreSQL: {}", e);
            e
        })?;

        db.run_migrations().await?;

        let llm = Arc::new(LlmService::new(provider));
        let monitor = Arc::new(RequestMonitor::new());
        let ip_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.requests,
            config.rate_limit.window_seconds,
        );

        let state = AppState {
            config: config.clone(),
            db,
            llm,
            monitor,
            ip_rate_limiter,
        };

        // Port 0 picks a random port for testing.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Chat service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Get a handle on the shared state (used by tests).
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = build_router(self.state);

        axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
    }
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    // Chat API, optionally behind a bearer key.
    let chat_api = Router::new()
        .route("/api/v1/chat", post(handlers::chat::chat))
        .route(
            "/api/v1/session/:conversation_id",
            get(handlers::chat::session_info),
        )
        .route(
            "/api/v1/session/context",
            post(handlers::chat::update_session_context),
        )
        .route(
            "/api/v1/conversations",
            get(handlers::chat::list_conversations),
        )
        .route(
            "/api/v1/conversations/:conversation_id",
            get(handlers::chat::conversation_history)
                .delete(handlers::chat::delete_conversation),
        )
        .layer(from_fn_with_state(state.clone(), api_key_auth_middleware));

    // Public catalog routes.
    let catalog_api = Router::new()
        .route("/api/products/search", get(handlers::products::search_by_name))
        .route(
            "/api/products/search-by-crop",
            get(handlers::products::search_by_crop),
        )
        .route(
            "/api/products/:product_name",
            get(handlers::products::get_by_name),
        )
        .route("/api/crops", get(handlers::products::list_crops));

    // Rate limiting applies to the API surface, not health probes.
    let mut api = chat_api.merge(catalog_api);
    if state.config.rate_limit.enabled {
        api = api.layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));
    }

    let admin = Router::new()
        .route("/admin/health", get(handlers::admin::system_health))
        .route("/admin/analytics", get(handlers::admin::usage_analytics))
        .route("/admin/errors", get(handlers::admin::error_summary))
        .route("/admin/config", get(handlers::admin::system_config))
        .route("/admin/status", get(handlers::admin::system_status))
        .route("/admin/clear-metrics", post(handlers::admin::clear_metrics))
        .route(
            "/admin/reset-circuit-breaker",
            post(handlers::admin::reset_circuit_breaker),
        )
        .layer(from_fn_with_state(state.clone(), admin_auth_middleware));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .merge(api)
        .merge(admin)
        .layer(from_fn_with_state(state.clone(), request_metrics_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
