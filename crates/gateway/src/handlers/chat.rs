//! Chat handlers
//!
//! Each question resets the conversation to the new user turn, grounds the
//! model in graph facts and stores the trimmed history under the session.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    response::Redirect,
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::AppState;
use provato_common::{
    errors::{AppError, Result},
    llm::{ChatMessage, QueryPlan},
    retrieval::RetrievalResult,
};

/// Header carrying the conversation session id
pub const SESSION_HEADER: HeaderName = HeaderName::from_static("x-session-id");

#[derive(Debug, Default, Deserialize)]
pub struct ChatParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub question: String,
    pub answer: String,
    pub source: String,
    pub facts_count: usize,
    pub plan: QueryPlan,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub history: Vec<ChatMessage>,
}

fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(&SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn session_header(id: &str) -> Result<HeaderMap> {
    let value = HeaderValue::from_str(id).map_err(|e| AppError::InvalidFormat {
        message: format!("Invalid session id: {}", e),
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(SESSION_HEADER, value);
    Ok(headers)
}

/// Answer a question from graph context
#[instrument(skip(state, headers, params))]
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ChatParams>,
) -> Result<(HeaderMap, Json<ChatResponse>)> {
    let start = Instant::now();

    let question = params.q.trim().to_string();
    if question.is_empty() {
        return Err(AppError::Validation {
            message: "No question provided".to_string(),
            field: Some("q".to_string()),
        });
    }

    let session = session_id(&headers).unwrap_or_else(|| Uuid::new_v4().to_string());
    let response_headers = session_header(&session)?;

    let mut history = vec![ChatMessage::user(&question)];

    let plan = state.llm.extract_search_plan(&question).await;
    let mut context = match plan.cypher.as_deref() {
        Some(cypher) if !plan.is_empty() => {
            state
                .retrieval
                .run_generated_cypher(cypher, state.config.retrieval.generated_row_limit)
                .await
        }
        _ => RetrievalResult::empty(),
    };

    if let Some(error) = &context.error {
        warn!(error = %error, "Generated query failed, expanding full-text hits");
    }
    if context.error.is_some() || context.facts.is_empty() {
        let retrieval = &state.config.retrieval;
        context = state
            .retrieval
            .search_and_expand(
                &question,
                retrieval.expand_top_k,
                retrieval.expand_neighbor_limit,
            )
            .await?;
    }

    let answer = state
        .llm
        .answer(&question, &context.text_context, &history)
        .await;

    history.push(ChatMessage::assistant(&answer.answer));
    let keep = state.config.retrieval.stored_history;
    let trimmed = &history[history.len().saturating_sub(keep)..];
    if let Err(e) = state.history.replace(&session, trimmed).await {
        warn!(session_id = %session, error = %e, "Failed to store chat history");
    }

    info!(
        session_id = %session,
        facts = context.facts.len(),
        fallback = answer.is_fallback(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Chat answered"
    );

    Ok((
        response_headers,
        Json(ChatResponse {
            question,
            answer: answer.answer,
            source: answer.source,
            facts_count: context.facts.len(),
            plan,
        }),
    ))
}

/// Stored history for the caller's session
pub async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>> {
    let session = session_id(&headers).ok_or_else(|| AppError::MissingField {
        field: SESSION_HEADER.as_str().to_string(),
    })?;
    let history = state.history.load(&session).await?;

    Ok(Json(HistoryResponse {
        session_id: session,
        history,
    }))
}

/// Legacy entry point that forwards to the chat endpoint
pub async fn qa_redirect(Query(params): Query<ChatParams>) -> Redirect {
    let question = params.q.trim();
    if question.is_empty() {
        Redirect::to("/chat")
    } else {
        Redirect::to(&format!("/chat?q={}", urlencoding::encode(question)))
    }
}
