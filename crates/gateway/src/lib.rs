//! Provato API Gateway
//!
//! HTTP surface over the retrieval engine and language-model gateway:
//! - Full-text search and autocomplete
//! - Node detail with relations and a category checklist
//! - Grounded chat with per-session history
//! - Health and readiness probes

pub mod handlers;
pub mod middleware;

use axum::{middleware::from_fn, routing::get, Router};
use provato_common::{
    config::AppConfig,
    graph::GraphStore,
    llm::{CompletionModel, LanguageGateway},
    retrieval::RetrievalEngine,
    session::HistoryStore,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub graph: Arc<dyn GraphStore>,
    pub retrieval: RetrievalEngine,
    pub llm: LanguageGateway,
    pub history: Arc<dyn HistoryStore>,
}

impl AppState {
    /// Wire the engine and gateway from their collaborators
    pub fn new(
        config: Arc<AppConfig>,
        graph: Arc<dyn GraphStore>,
        model: Arc<dyn CompletionModel>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let retrieval = RetrievalEngine::new(graph.clone(), config.retrieval.clone());
        let llm = LanguageGateway::new(model, config.retrieval.prompt_history);
        Self {
            config,
            graph,
            retrieval,
            llm,
            history,
        }
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([handlers::chat::SESSION_HEADER]);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout = TimeoutLayer::new(state.config.request_timeout());

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        // Search endpoints
        .route("/search", get(handlers::search::search))
        .route("/autocomplete", get(handlers::search::autocomplete))
        // Node detail
        .route("/detail/{node_id}", get(handlers::detail::detail))
        // Chat endpoints
        .route("/chat", get(handlers::chat::chat))
        .route("/chat/history", get(handlers::chat::history))
        .route("/qa", get(handlers::chat::qa_redirect))
        .layer(from_fn(middleware::metrics::track_requests))
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}
