//! Search handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

use crate::AppState;
use provato_common::{
    errors::{AppError, Result},
    retrieval::SearchHit,
};

/// Search query string
#[derive(Debug, Deserialize, Validate)]
pub struct SearchParams {
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub q: String,

    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}

/// Search response
#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total_results: usize,
    pub results: Vec<SearchHit>,
    pub processing_time_ms: u64,
}

/// Autocomplete query string
#[derive(Debug, Default, Deserialize)]
pub struct AutocompleteParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Serialize)]
pub struct AutocompleteResponse {
    pub results: Vec<String>,
}

/// Ranked full-text search over every indexed node
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    let start = Instant::now();

    params.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let query = params.q.trim();
    if query.is_empty() {
        return Err(AppError::Validation {
            message: "Query must not be empty".to_string(),
            field: Some("q".to_string()),
        });
    }

    let limit = params
        .limit
        .unwrap_or(state.retrieval.config().search_limit);
    let results = state.retrieval.universal_search(query, limit).await?;

    let processing_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        query = %query,
        results = results.len(),
        latency_ms = processing_time_ms,
        "Search completed"
    );

    Ok(Json(SearchResponse {
        query: query.to_string(),
        total_results: results.len(),
        results,
        processing_time_ms,
    }))
}

/// Suggestions for a partial name, tag, breed or owner
pub async fn autocomplete(
    State(state): State<AppState>,
    Query(params): Query<AutocompleteParams>,
) -> Result<Json<AutocompleteResponse>> {
    let results = state.retrieval.get_suggestions(&params.q).await?;
    Ok(Json(AutocompleteResponse { results }))
}
