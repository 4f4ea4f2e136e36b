//! Chat API handlers: the main chat turn, session inspection, and
//! conversation history management.

use crate::dtos::chat::{
    sanitize_message, validate_conversation_id, ChatMetadata, ChatRequest, ChatResponse,
    ContextProduct, ConversationEntry, SessionContextUpdate, SessionInfo,
};
use crate::models::{ChatLog, NewChatLog};
use crate::services::context::{accumulate_context, extract_context, MessageContext};
use crate::services::llm::ChatStatus;
use crate::services::metrics::CHAT_REQUESTS_TOTAL;
use crate::services::prompt;
use crate::services::retrieval::{relevant_products, RetrievedProducts};
use crate::startup::AppState;
use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use service_core::error::AppError;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// Turns of prior history folded into conversation context.
const CONTEXT_HISTORY_LIMIT: i64 = 5;

/// Products echoed back in `context_used`.
const CONTEXT_USED_LIMIT: usize = 10;

fn client_ip(headers: &HeaderMap, addr: Option<&SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| addr.map(|a| a.ip().to_string()))
}

/// Main chat endpoint.
///
/// POST /api/v1/chat
#[instrument(skip(state, headers, addr, request), fields(conversation_id = tracing::field::Empty))]
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    addr: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let started = Instant::now();

    request.validate()?;
    let message = sanitize_message(&request.message, state.config.validation.max_message_length)?;

    if let Some(id) = &request.conversation_id {
        if !validate_conversation_id(id) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid conversation ID format"
            )));
        }
    }
    let conversation_id = request
        .conversation_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    tracing::Span::current().record("conversation_id", conversation_id.as_str());

    // Context from this message alone.
    let extracted_context = extract_context(&message);

    // Accumulated context from prior turns, oldest first so newer
    // messages override. History problems degrade to an empty context
    // rather than failing the turn.
    let conversation_context = match state
        .db
        .get_chat_history(&conversation_id, CONTEXT_HISTORY_LIMIT)
        .await
    {
        Ok(history) => {
            accumulate_context(history.iter().rev().map(|e| e.user_message.as_str()))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not retrieve conversation context");
            MessageContext::default()
        }
    };

    // Merge precedence: conversation < this message < caller-supplied.
    let mut combined_context = conversation_context.clone();
    combined_context.merge_from(&extracted_context);
    request.user_context.apply_to(&mut combined_context);

    tracing::debug!(context = ?combined_context, "Combined chat context");

    let RetrievedProducts {
        products,
        ph_unified,
    } = match relevant_products(&state.db, &combined_context).await {
        Ok(retrieved) => retrieved,
        Err(e) => {
            tracing::warn!(error = %e, "Product retrieval failed, continuing without context");
            RetrievedProducts::default()
        }
    };

    tracing::info!(products = products.len(), "Retrieved relevant products");

    let analysis = prompt::analyze_context(&combined_context);
    let system_prompt =
        prompt::build_system_prompt(&products, &combined_context, &analysis, ph_unified);

    let outcome = state.llm.chat(&system_prompt, &message).await;
    CHAT_REQUESTS_TOTAL
        .with_label_values(&[outcome.status.as_str()])
        .inc();

    let response_time = started.elapsed().as_secs_f64();

    let context_used: Vec<ContextProduct> = products
        .iter()
        .take(CONTEXT_USED_LIMIT)
        .map(ContextProduct::from_product)
        .collect();

    let history_count = state
        .db
        .count_chat_history(&conversation_id)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not count history");
            0
        });

    let log = NewChatLog {
        session_id: conversation_id.clone(),
        user_message: message.clone(),
        bot_response: outcome.response.clone(),
        category: Some("product_recommendation".to_string()),
        product_context: serde_json::to_string(&context_used).ok(),
        response_time_ms: Some((response_time * 1000.0) as i32),
        user_ip: client_ip(&headers, addr.as_ref().map(|ConnectInfo(a)| a)),
        user_agent: headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
    };
    if let Err(e) = state.db.log_chat_interaction(&log).await {
        // Never fail the turn because bookkeeping failed.
        tracing::error!(error = %e, "Failed to log chat interaction");
    }

    let status = match outcome.status {
        ChatStatus::Success => "success",
        _ => "partial",
    };

    Ok(Json(ChatResponse {
        response: outcome.response,
        conversation_id: conversation_id.clone(),
        context_used,
        metadata: ChatMetadata {
            response_time: (response_time * 100.0).round() / 100.0,
            model_used: state.llm.model().unwrap_or_else(|| "fallback".to_string()),
            products_count: products.len(),
            context_extracted: extracted_context,
            conversation_context,
            combined_context,
            history_count,
            timestamp: Utc::now(),
        },
        status: status.to_string(),
    }))
}

/// Session information for context continuity.
///
/// GET /api/v1/session/:conversation_id
#[instrument(skip(state))]
pub async fn session_info(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<SessionInfo>, AppError> {
    let history = state.db.get_chat_history(&conversation_id, 50).await?;

    let extracted_context = history
        .first()
        .map(|latest| extract_context(&latest.user_message))
        .unwrap_or_default();

    let recommendations_given = history.iter().filter(|e| e.has_product_context()).count() as i64;

    Ok(Json(SessionInfo {
        conversation_id,
        session_active: !history.is_empty(),
        message_count: history.len() as i64,
        last_activity: history
            .first()
            .map(|e| e.created_utc)
            .unwrap_or_else(Utc::now),
        extracted_context,
        recommendations_given,
    }))
}

/// Manual session context update. The merged context is acknowledged but
/// not persisted; callers resend it per turn.
///
/// POST /api/v1/session/context
#[instrument(skip(update), fields(conversation_id = %update.conversation_id))]
pub async fn update_session_context(
    Json(update): Json<SessionContextUpdate>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !validate_conversation_id(&update.conversation_id) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Invalid conversation ID format"
        )));
    }

    tracing::info!("Session context update received");

    Ok(Json(json!({
        "conversation_id": update.conversation_id,
        "updated_context": update.context,
        "status": "success",
        "message": "Session context updated successfully",
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_list_limit")]
    pub limit: i64,
}

fn default_list_limit() -> i64 {
    20
}

/// List recent conversations.
///
/// GET /api/v1/conversations
#[instrument(skip(state))]
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<crate::models::ConversationSummary>>, AppError> {
    let limit = query.limit.clamp(1, 100);
    let conversations = state.db.list_conversations(limit).await?;
    Ok(Json(conversations))
}

/// Conversation history, newest first.
///
/// GET /api/v1/conversations/:conversation_id
#[instrument(skip(state))]
pub async fn conversation_history(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<ConversationEntry>>, AppError> {
    let history = state.db.get_chat_history(&conversation_id, 50).await?;

    let formatted = history.into_iter().map(format_entry).collect();
    Ok(Json(formatted))
}

fn format_entry(entry: ChatLog) -> ConversationEntry {
    ConversationEntry {
        message_id: entry.log_id,
        user_message: entry.user_message,
        ai_response: entry.bot_response,
        timestamp: entry.created_utc,
        category: entry.category,
    }
}

/// Delete a conversation (privacy/GDPR erasure).
///
/// DELETE /api/v1/conversations/:conversation_id
#[instrument(skip(state))]
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = state.db.delete_conversation(&conversation_id).await?;

    if deleted == 0 {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Conversation {} not found",
            conversation_id
        )));
    }

    Ok(Json(json!({
        "message": format!("Conversation {} deleted", conversation_id),
        "deleted_messages": deleted,
    })))
}
