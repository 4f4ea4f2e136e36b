//! Database service for chat-service.
//!
//! Product catalog reads and chat-log persistence over a shared PostgreSQL
//! pool. Catalog text filters use ILIKE because catalog values are
//! free-form strings maintained by hand.

use crate::models::{ChatLog, ConversationSummary, NewChatLog, Product};
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

const PRODUCT_COLUMNS: &str = "product_name, crop, application, application_type, \
     growth_stage, problem, directions, label, msds, tech_doc, notes, m_intervention";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "chat-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Connection details for the admin status endpoint.
    #[instrument(skip(self))]
    pub async fn database_info(&self) -> Result<serde_json::Value, AppError> {
        let (db_name, version): (String, String) =
            sqlx::query_as("SELECT current_database(), version()")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to get database info: {}", e))
                })?;

        Ok(serde_json::json!({
            "status": "connected",
            "database_name": db_name,
            "version": version,
            "pool_size": self.pool.size(),
            "idle_connections": self.pool.num_idle(),
        }))
    }

    // -------------------------------------------------------------------------
    // Product Catalog Operations
    // -------------------------------------------------------------------------

    /// Search products whose crop matches the query.
    #[instrument(skip(self))]
    pub async fn search_products(
        &self,
        crop_query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["search_products"])
            .start_timer();

        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE crop ILIKE $1
            ORDER BY product_name
            LIMIT $2
            "#,
        ))
        .bind(format!("%{}%", crop_query))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to search products: {}", e)))?;

        timer.observe_duration();

        Ok(products)
    }

    /// Search products by name (partial match).
    #[instrument(skip(self))]
    pub async fn search_products_by_name(
        &self,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["search_products_by_name"])
            .start_timer();

        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE product_name ILIKE $1
            ORDER BY product_name
            LIMIT $2
            "#,
        ))
        .bind(format!("%{}%", query))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to search products by name: {}", e))
        })?;

        timer.observe_duration();

        Ok(products)
    }

    /// Get a product by exact name. Returns the first matching row.
    #[instrument(skip(self))]
    pub async fn get_product_by_name(&self, name: &str) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product_by_name"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE product_name = $1
            ORDER BY product_name
            LIMIT 1
            "#,
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get product: {}", e)))?;

        timer.observe_duration();

        Ok(product)
    }

    /// Search products by any combination of crop, application type and
    /// problem. All criteria absent yields an empty result.
    #[instrument(skip(self))]
    pub async fn search_products_by_criteria(
        &self,
        crop: Option<&str>,
        application_type: Option<&str>,
        problem: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<Product>, AppError> {
        if crop.is_none() && application_type.is_none() && problem.is_none() {
            return Ok(Vec::new());
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["search_products_by_criteria"])
            .start_timer();

        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE ($1::varchar IS NULL OR crop ILIKE '%' || $1 || '%')
              AND ($2::varchar IS NULL OR application_type ILIKE '%' || $2 || '%')
              AND ($3::varchar IS NULL OR problem ILIKE '%' || $3 || '%')
            ORDER BY product_name
            LIMIT $4
            "#,
        ))
        .bind(crop)
        .bind(application_type)
        .bind(problem)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to search by criteria: {}", e))
        })?;

        timer.observe_duration();

        Ok(products)
    }

    /// Distinct crop names in the catalog.
    #[instrument(skip(self))]
    pub async fn list_crops(&self) -> Result<Vec<String>, AppError> {
        self.list_distinct("crop", "list_crops").await
    }

    /// Distinct problem names in the catalog.
    #[instrument(skip(self))]
    pub async fn list_problems(&self) -> Result<Vec<String>, AppError> {
        self.list_distinct("problem", "list_problems").await
    }

    /// Distinct application types in the catalog.
    #[instrument(skip(self))]
    pub async fn list_application_types(&self) -> Result<Vec<String>, AppError> {
        self.list_distinct("application_type", "list_application_types")
            .await
    }

    /// Distinct growth stages in the catalog.
    #[instrument(skip(self))]
    pub async fn list_growth_stages(&self) -> Result<Vec<String>, AppError> {
        self.list_distinct("growth_stage", "list_growth_stages").await
    }

    async fn list_distinct(
        &self,
        column: &'static str,
        operation: &'static str,
    ) -> Result<Vec<String>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&[operation])
            .start_timer();

        let values: Vec<(String,)> = sqlx::query_as(&format!(
            "SELECT DISTINCT {column} FROM products WHERE {column} IS NOT NULL ORDER BY {column}",
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list {}: {}", column, e)))?;

        timer.observe_duration();

        Ok(values.into_iter().map(|(v,)| v).collect())
    }

    // -------------------------------------------------------------------------
    // Chat Log Operations
    // -------------------------------------------------------------------------

    /// Insert one chat turn.
    #[instrument(skip(self, log), fields(session_id = %log.session_id))]
    pub async fn log_chat_interaction(&self, log: &NewChatLog) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["log_chat_interaction"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO chat_logs
                (session_id, user_message, bot_response, category,
                 product_context, response_time_ms, user_ip, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&log.session_id)
        .bind(&log.user_message)
        .bind(&log.bot_response)
        .bind(&log.category)
        .bind(&log.product_context)
        .bind(log.response_time_ms)
        .bind(&log.user_ip)
        .bind(&log.user_agent)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to log chat: {}", e)))?;

        timer.observe_duration();

        Ok(())
    }

    /// Chat history for a session, newest first.
    #[instrument(skip(self))]
    pub async fn get_chat_history(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatLog>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_chat_history"])
            .start_timer();

        let history = sqlx::query_as::<_, ChatLog>(
            r#"
            SELECT log_id, session_id, user_message, bot_response, category,
                   product_context, response_time_ms, user_ip, user_agent,
                   created_utc, is_resolved, feedback
            FROM chat_logs
            WHERE session_id = $1
            ORDER BY created_utc DESC, log_id DESC
            LIMIT $2
            "#,
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get history: {}", e)))?;

        timer.observe_duration();

        Ok(history)
    }

    /// Number of stored turns for a session.
    #[instrument(skip(self))]
    pub async fn count_chat_history(&self, session_id: &str) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["count_chat_history"])
            .start_timer();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chat_logs WHERE session_id = $1")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to count history: {}", e))
                })?;

        timer.observe_duration();

        Ok(count)
    }

    /// Recent conversations, most recently active first.
    #[instrument(skip(self))]
    pub async fn list_conversations(
        &self,
        limit: i64,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_conversations"])
            .start_timer();

        let conversations = sqlx::query_as::<_, ConversationSummary>(
            r#"
            SELECT session_id AS conversation_id,
                   COUNT(*) AS message_count,
                   MIN(created_utc) AS created_at,
                   MAX(created_utc) AS last_message_at,
                   (ARRAY_AGG(category ORDER BY created_utc DESC))[1] AS category
            FROM chat_logs
            GROUP BY session_id
            ORDER BY MAX(created_utc) DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list conversations: {}", e))
        })?;

        timer.observe_duration();

        Ok(conversations)
    }

    /// Delete every turn of a conversation. Returns the deleted row count.
    #[instrument(skip(self))]
    pub async fn delete_conversation(&self, session_id: &str) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_conversation"])
            .start_timer();

        let result = sqlx::query("DELETE FROM chat_logs WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete conversation: {}", e))
            })?;

        timer.observe_duration();

        info!(
            session_id = session_id,
            deleted = result.rows_affected(),
            "Conversation deleted"
        );

        Ok(result.rows_affected())
    }
}
