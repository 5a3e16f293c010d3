//! Graph client layer
//!
//! Provides:
//! - A store-agnostic `GraphStore` trait (parametrized reads, batched writes)
//! - The Neo4j implementation over Bolt
//! - An in-memory implementation for tests and local runs
//! - Property value model and the exact-lookup filter builder

pub mod filter;
pub mod memory;
mod neo4j;
mod value;

pub use filter::{NodeFilter, RenderedFilter};
pub use memory::MemoryGraph;
pub use neo4j::Neo4jGraph;
pub use value::{GraphValue, Properties, Record};

use async_trait::async_trait;
use thiserror::Error;

/// Name of the full-text index covering every searchable node
pub const FULLTEXT_INDEX: &str = "everythingIndex";

/// Graph client errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("query failed: {message}")]
    Query { message: String },

    #[error("connection failed: {message}")]
    Connection { message: String },

    #[error("could not decode row: {message}")]
    Decode { message: String },

    #[error("unsupported by this store: {message}")]
    Unsupported { message: String },
}

/// What a query is for. Used for logging and metrics labels, and lets
/// stores that do not speak Cypher evaluate the fixed queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryKind {
    /// Full-text index search (`q`, `limit`)
    FullText,
    /// Autocomplete candidates (`partial`, `limit`)
    Suggestions,
    /// Single node by element id (`id`)
    Node,
    /// Relationships of one node (`id`, optional `limit`)
    Neighbors,
    /// Exact filtered lookup (`limit` plus the filter's own parameters)
    Lookup(NodeFilter),
    /// Externally authored query text, executed verbatim
    Generated,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::FullText => "full_text",
            QueryKind::Suggestions => "suggestions",
            QueryKind::Node => "node",
            QueryKind::Neighbors => "neighbors",
            QueryKind::Lookup(_) => "lookup",
            QueryKind::Generated => "generated",
        }
    }
}

/// A parametrized read query
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQuery {
    pub kind: QueryKind,
    pub text: String,
    pub params: Vec<(String, GraphValue)>,
    /// Stop reading after this many rows
    pub row_limit: Option<usize>,
}

impl GraphQuery {
    pub fn new(kind: QueryKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            params: Vec::new(),
            row_limit: None,
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<GraphValue>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = (String, GraphValue)>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn limit_rows(mut self, limit: usize) -> Self {
        self.row_limit = Some(limit);
        self
    }

    /// Look up a bound parameter by name
    pub fn param_value(&self, name: &str) -> Option<&GraphValue> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// Identifies a node by label and key property
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRef {
    pub label: &'static str,
    pub key_field: &'static str,
    pub key: GraphValue,
}

impl NodeRef {
    pub fn new(label: &'static str, key_field: &'static str, key: impl Into<GraphValue>) -> Self {
        Self {
            label,
            key_field,
            key: key.into(),
        }
    }
}

/// Outgoing relationship from an upserted node to an existing one
#[derive(Debug, Clone, PartialEq)]
pub struct NodeLink {
    pub rel_type: &'static str,
    pub target: NodeRef,
}

/// Idempotent write, merged by identifier
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// MERGE the node, overwrite the given properties, then MERGE the
    /// link if its target exists
    UpsertNode {
        node: NodeRef,
        properties: Properties,
        link: Option<NodeLink>,
    },
    /// MERGE a relationship between two existing, distinct nodes and
    /// overwrite its properties
    Connect {
        from: NodeRef,
        to: NodeRef,
        rel_type: &'static str,
        properties: Properties,
    },
}

impl Mutation {
    /// Cypher text and bound parameters. Labels, key fields and relation
    /// types are static names; everything else is a parameter.
    pub fn to_cypher(&self) -> (String, Vec<(String, GraphValue)>) {
        match self {
            Mutation::UpsertNode {
                node,
                properties,
                link,
            } => {
                let mut text = format!(
                    "MERGE (n:`{}` {{`{}`: $key}})\nSET n += $props",
                    node.label, node.key_field
                );
                let mut params = vec![
                    ("key".to_string(), node.key.clone()),
                    ("props".to_string(), GraphValue::Map(properties.clone())),
                ];
                if let Some(link) = link {
                    text.push_str(&format!(
                        "\nWITH n\nMATCH (t:`{}` {{`{}`: $target_key}})\nMERGE (n)-[:`{}`]->(t)",
                        link.target.label, link.target.key_field, link.rel_type
                    ));
                    params.push(("target_key".to_string(), link.target.key.clone()));
                }
                (text, params)
            }
            Mutation::Connect {
                from,
                to,
                rel_type,
                properties,
            } => {
                let text = format!(
                    "MATCH (a:`{}` {{`{}`: $from_key}}), (b:`{}` {{`{}`: $to_key}})\n\
                     WHERE a <> b\n\
                     MERGE (a)-[r:`{}`]->(b)\n\
                     SET r += $props",
                    from.label, from.key_field, to.label, to.key_field, rel_type
                );
                let params = vec![
                    ("from_key".to_string(), from.key.clone()),
                    ("to_key".to_string(), to.key.clone()),
                    ("props".to_string(), GraphValue::Map(properties.clone())),
                ];
                (text, params)
            }
        }
    }
}

/// Trait for graph stores
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Run a read query and collect its rows
    async fn fetch(&self, query: &GraphQuery) -> Result<Vec<Record>, GraphError>;

    /// Apply a batch of writes in one transaction
    async fn apply(&self, batch: &[Mutation]) -> Result<(), GraphError>;

    /// Check connectivity
    async fn ping(&self) -> Result<(), GraphError>;
}
