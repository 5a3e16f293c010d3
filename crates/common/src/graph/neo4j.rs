//! Neo4j store over Bolt

use super::{GraphError, GraphQuery, GraphStore, GraphValue, Mutation, Record};
use crate::config::GraphConfig;
use crate::metrics;
use async_trait::async_trait;
use neo4rs::{BoltList, BoltMap, BoltNull, BoltString, BoltType, ConfigBuilder, Graph, Query};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Pooled Neo4j client
///
/// Each call leases a connection from the pool; the lease is returned when
/// the row stream or transaction is dropped, on every exit path.
#[derive(Clone)]
pub struct Neo4jGraph {
    graph: Graph,
    database: String,
}

impl Neo4jGraph {
    /// Connect using the given configuration
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        info!(uri = %config.uri, database = %config.database, "Connecting to graph database...");

        let bolt_config = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .db(config.database.as_str())
            .max_connections(config.max_connections)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection {
                message: format!("Invalid graph configuration: {}", e),
            })?;

        let graph = Graph::connect(bolt_config)
            .await
            .map_err(|e| GraphError::Connection {
                message: format!("Failed to connect to {}: {}", config.uri, e),
            })?;

        info!("Graph connection pool established");

        Ok(Self {
            graph,
            database: config.database.clone(),
        })
    }

    /// Release the pool. Outstanding clones keep their own handle.
    pub fn close(self) {
        info!(database = %self.database, "Closing graph connection pool");
        drop(self.graph);
    }

    async fn read(&self, query: &GraphQuery) -> Result<Vec<Record>, GraphError> {
        let mut stream = self.graph.execute(to_bolt_query(&query.text, &query.params)).await?;

        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row.to::<Record>()?);
            if query.row_limit.is_some_and(|limit| rows.len() >= limit) {
                break;
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl GraphStore for Neo4jGraph {
    async fn fetch(&self, query: &GraphQuery) -> Result<Vec<Record>, GraphError> {
        let kind = query.kind.as_str();
        let start = Instant::now();

        let result = self.read(query).await;

        let duration = start.elapsed().as_secs_f64();
        metrics::record_graph_query(kind, duration, result.is_ok());
        match &result {
            Ok(rows) => debug!(kind, rows = rows.len(), duration_ms = duration * 1000.0, "Graph query complete"),
            Err(e) => warn!(kind, error = %e, "Graph query failed"),
        }
        result
    }

    async fn apply(&self, batch: &[Mutation]) -> Result<(), GraphError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut txn = self.graph.start_txn().await?;
        for mutation in batch {
            let (text, params) = mutation.to_cypher();
            if let Err(e) = txn.run(to_bolt_query(&text, &params)).await {
                metrics::record_graph_batch(batch.len(), false);
                // Dropping the transaction without commit rolls it back
                return Err(e.into());
            }
        }
        txn.commit().await?;

        metrics::record_graph_batch(batch.len(), true);
        debug!(size = batch.len(), "Batch committed");
        Ok(())
    }

    async fn ping(&self) -> Result<(), GraphError> {
        self.graph
            .run(neo4rs::query("RETURN 1"))
            .await
            .map_err(|e| GraphError::Connection {
                message: format!("Ping failed: {}", e),
            })
    }
}

fn to_bolt_query(text: &str, params: &[(String, GraphValue)]) -> Query {
    params
        .iter()
        .fold(neo4rs::query(text), |q, (name, value)| {
            q.param(name, to_bolt(value))
        })
}

fn to_bolt(value: &GraphValue) -> BoltType {
    match value {
        GraphValue::Null => BoltType::Null(BoltNull),
        GraphValue::Bool(b) => BoltType::from(*b),
        GraphValue::Int(i) => BoltType::from(*i),
        GraphValue::Float(f) => BoltType::from(*f),
        GraphValue::String(s) => BoltType::from(s.as_str()),
        GraphValue::List(items) => {
            BoltType::List(BoltList::from(items.iter().map(to_bolt).collect::<Vec<_>>()))
        }
        GraphValue::Map(map) => {
            let mut bolt = BoltMap::new();
            for (key, value) in map {
                bolt.put(BoltString::from(key.as_str()), to_bolt(value));
            }
            BoltType::Map(bolt)
        }
    }
}

impl From<neo4rs::Error> for GraphError {
    fn from(err: neo4rs::Error) -> Self {
        GraphError::Query {
            message: err.to_string(),
        }
    }
}

impl From<neo4rs::DeError> for GraphError {
    fn from(err: neo4rs::DeError) -> Self {
        GraphError::Decode {
            message: err.to_string(),
        }
    }
}
