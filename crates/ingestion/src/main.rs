//! Provato Ingestion
//!
//! Offline bulk loaders for the farm graph:
//! 1. Reads a CSV file with a header row
//! 2. Maps each row to an upsert merged by identifier
//! 3. Commits one transaction per batch

use anyhow::Context;
use clap::{Parser, Subcommand};
use provato_common::{
    config::{AppConfig, ObservabilityConfig},
    graph::Neo4jGraph,
    VERSION,
};
use provato_ingestion::{BulkLoader, Entity};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ingestion", version, about = "Load farm CSV exports into the graph")]
struct Cli {
    /// Rows per transaction (defaults to ingestion.batch_size)
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Farms merged by id
    Farms { file: PathBuf },
    /// Animals merged by id, linked to their farm
    Animals { file: PathBuf },
    /// Devices merged by id, attached to their animal
    Devices { file: PathBuf },
    /// Device telemetry merged by id, linked to its device
    DeviceData { file: PathBuf },
    /// Weather readings, linked to their farm
    Meteo { file: PathBuf },
    /// Distances between animals
    Contacts { file: PathBuf },
    /// Every standard file in a directory
    All {
        #[arg(long)]
        dir: PathBuf,
        /// Also load device_data.csv and meteo_data.csv
        #[arg(long)]
        with_telemetry: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting Provato Ingestion v{}",
        VERSION
    );

    info!(uri = %config.graph.uri, "Connecting to graph database...");
    let graph = Neo4jGraph::connect(&config.graph)
        .await
        .context("failed to connect to graph database")?;
    let batch_size = cli.batch_size.unwrap_or(config.ingestion.batch_size);
    let loader = BulkLoader::new(Arc::new(graph.clone()), batch_size);

    let (entity, file) = match cli.command {
        Command::Farms { file } => (Entity::Farms, file),
        Command::Animals { file } => (Entity::Animals, file),
        Command::Devices { file } => (Entity::Devices, file),
        Command::DeviceData { file } => (Entity::DeviceData, file),
        Command::Meteo { file } => (Entity::Meteo, file),
        Command::Contacts { file } => (Entity::Contacts, file),
        Command::All {
            dir,
            with_telemetry,
        } => {
            let reports = loader
                .load_directory(&dir, with_telemetry)
                .await
                .with_context(|| format!("failed to load {}", dir.display()))?;
            let loaded: usize = reports.iter().map(|(_, r)| r.loaded).sum();
            info!(files = reports.len(), loaded, "All uploads complete");
            graph.close();
            return Ok(());
        }
    };

    loader
        .load_file(entity, &file)
        .await
        .with_context(|| format!("failed to load {} from {}", entity, file.display()))?;

    graph.close();
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
