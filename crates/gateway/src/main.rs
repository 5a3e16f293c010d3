//! Provato API Gateway
//!
//! The main entry point for the HTTP API.
//! Handles:
//! - Configuration and dependency construction
//! - Request routing
//! - Observability (logging, metrics)

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use provato_common::{
    config::{AppConfig, ObservabilityConfig},
    graph::{GraphStore, Neo4jGraph},
    llm::create_completion_model,
    metrics,
    session::create_history_store,
};
use provato_gateway::{create_router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting Provato API Gateway v{}",
        provato_common::VERSION
    );
    let config = Arc::new(config);

    // Initialize metrics
    if config.observability.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        info!("Metrics exporter listening on {}", addr);
    }
    metrics::register_metrics();

    // Graph store
    info!(uri = %config.graph.uri, "Connecting to graph database...");
    let neo4j = Neo4jGraph::connect(&config.graph)
        .await
        .context("failed to connect to graph database")?;
    let graph: Arc<dyn GraphStore> = Arc::new(neo4j.clone());
    if let Err(e) = graph.ping().await {
        warn!(error = %e, "Graph database not reachable yet");
    }

    // Language model and history
    let model = create_completion_model(&config.llm).context("invalid language-model settings")?;
    let history = create_history_store(&config.session)
        .await
        .context("failed to open history store")?;

    let state = AppState::new(config.clone(), graph, model, history);
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    neo4j.close();
    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
