//! In-memory graph store
//!
//! Evaluates the fixed query kinds issued by the retrieval engine directly
//! against nodes held in memory, serves canned rows for generated queries,
//! and applies mutations with MERGE semantics. Used by tests.

use super::{GraphError, GraphQuery, GraphStore, GraphValue, Mutation, NodeRef, Properties, QueryKind, Record};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Fields searched by autocomplete, in coalesce order
const SUGGESTION_FIELDS: &[&str] = &["name", "tag", "breed", "owner"];

#[derive(Debug, Clone)]
struct MemoryNode {
    labels: Vec<String>,
    properties: Properties,
}

#[derive(Debug, Clone)]
struct MemoryEdge {
    from: usize,
    to: usize,
    rel_type: String,
    properties: Properties,
}

#[derive(Debug, Clone, Default)]
struct State {
    nodes: Vec<MemoryNode>,
    edges: Vec<MemoryEdge>,
}

impl State {
    fn find(&self, node: &NodeRef) -> Option<usize> {
        self.nodes.iter().position(|n| {
            n.labels.iter().any(|l| l == node.label)
                && n.properties.get(node.key_field) == Some(&node.key)
        })
    }

    fn merge_edge(&mut self, from: usize, to: usize, rel_type: &str) -> usize {
        if let Some(idx) = self
            .edges
            .iter()
            .position(|e| e.from == from && e.to == to && e.rel_type == rel_type)
        {
            return idx;
        }
        self.edges.push(MemoryEdge {
            from,
            to,
            rel_type: rel_type.to_string(),
            properties: Properties::new(),
        });
        self.edges.len() - 1
    }

    fn apply(&mut self, mutation: &Mutation) -> Result<(), GraphError> {
        match mutation {
            Mutation::UpsertNode {
                node,
                properties,
                link,
            } => {
                if node.key.is_null() {
                    return Err(GraphError::Query {
                        message: format!(
                            "Cannot merge node because of null property value for '{}'",
                            node.key_field
                        ),
                    });
                }
                let idx = match self.find(node) {
                    Some(idx) => idx,
                    None => {
                        let mut initial = Properties::new();
                        initial.insert(node.key_field.to_string(), node.key.clone());
                        self.nodes.push(MemoryNode {
                            labels: vec![node.label.to_string()],
                            properties: initial,
                        });
                        self.nodes.len() - 1
                    }
                };
                set_properties(&mut self.nodes[idx].properties, properties);

                if let Some(link) = link {
                    if let Some(target) = self.find(&link.target) {
                        self.merge_edge(idx, target, link.rel_type);
                    }
                }
                Ok(())
            }
            Mutation::Connect {
                from,
                to,
                rel_type,
                properties,
            } => {
                if let (Some(a), Some(b)) = (self.find(from), self.find(to)) {
                    if a != b {
                        let edge = self.merge_edge(a, b, rel_type);
                        set_properties(&mut self.edges[edge].properties, properties);
                    }
                }
                Ok(())
            }
        }
    }
}

/// `SET x += map`: null entries remove the property
fn set_properties(target: &mut Properties, update: &Properties) {
    for (key, value) in update {
        if value.is_null() {
            target.remove(key);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn element_id(idx: usize) -> String {
    format!("mem:{idx}")
}

fn parse_element_id(id: &str) -> Option<usize> {
    id.strip_prefix("mem:")?.parse().ok()
}

/// Graph store held in process memory
#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: RwLock<State>,
    generated: RwLock<HashMap<String, Result<Vec<Record>, String>>>,
    queries: AtomicUsize,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a node and return its element id
    pub fn add_node<'a, P>(&self, labels: &[&str], properties: P) -> String
    where
        P: IntoIterator<Item = (&'a str, GraphValue)>,
    {
        let mut state = self.write();
        state.nodes.push(MemoryNode {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        });
        element_id(state.nodes.len() - 1)
    }

    /// Insert a directed relationship between two element ids
    pub fn add_edge(&self, from: &str, to: &str, rel_type: &str) -> bool {
        let mut state = self.write();
        match (parse_element_id(from), parse_element_id(to)) {
            (Some(a), Some(b)) if a < state.nodes.len() && b < state.nodes.len() => {
                state.merge_edge(a, b, rel_type);
                true
            }
            _ => false,
        }
    }

    /// Rows returned when this exact query text is run as a generated query
    pub fn set_generated(&self, text: &str, rows: Vec<Record>) {
        if let Ok(mut canned) = self.generated.write() {
            canned.insert(text.trim().to_string(), Ok(rows));
        }
    }

    /// Error returned when this exact query text is run as a generated query
    pub fn fail_generated(&self, text: &str, message: &str) {
        if let Ok(mut canned) = self.generated.write() {
            canned.insert(text.trim().to_string(), Err(message.to_string()));
        }
    }

    /// Number of read queries issued so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn node_count(&self) -> usize {
        self.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.read().edges.len()
    }

    /// Properties of every node carrying the label, in insertion order
    pub fn nodes_with_label(&self, label: &str) -> Vec<Properties> {
        self.read()
            .nodes
            .iter()
            .filter(|n| n.labels.iter().any(|l| l == label))
            .map(|n| n.properties.clone())
            .collect()
    }

    /// Properties of every relationship of the given type
    pub fn edges_of_type(&self, rel_type: &str) -> Vec<Properties> {
        self.read()
            .edges
            .iter()
            .filter(|e| e.rel_type == rel_type)
            .map(|e| e.properties.clone())
            .collect()
    }

    fn node_row(idx: usize, node: &MemoryNode) -> Record {
        Record::new()
            .with("neo4j_id", element_id(idx))
            .with("labels", node.labels.clone())
            .with("props", node.properties.clone())
    }

    fn full_text(state: &State, query: &GraphQuery) -> Vec<Record> {
        let text = query
            .param_value("q")
            .and_then(GraphValue::as_str)
            .unwrap_or_default();
        let terms = tokens(text);

        let mut scored: Vec<(f64, usize)> = state
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, node)| {
                let indexed: Vec<String> = node
                    .properties
                    .values()
                    .filter_map(GraphValue::as_str)
                    .flat_map(tokens)
                    .collect();
                let hits = terms.iter().filter(|term| indexed.contains(term)).count();
                (hits > 0).then_some((hits as f64, idx))
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        scored
            .into_iter()
            .take(limit_param(query))
            .map(|(score, idx)| Self::node_row(idx, &state.nodes[idx]).with("score", score))
            .collect()
    }

    fn suggestions(state: &State, query: &GraphQuery) -> Vec<Record> {
        let partial = query
            .param_value("partial")
            .and_then(GraphValue::as_str)
            .unwrap_or_default()
            .to_lowercase();

        let mut found: Vec<GraphValue> = Vec::new();
        for node in &state.nodes {
            let matched = SUGGESTION_FIELDS.iter().any(|field| {
                node.properties
                    .get(*field)
                    .filter(|v| !v.is_null())
                    .is_some_and(|v| v.to_string().to_lowercase().contains(&partial))
            });
            if !matched {
                continue;
            }
            let suggestion = SUGGESTION_FIELDS
                .iter()
                .filter_map(|field| node.properties.get(*field))
                .find(|v| !v.is_null())
                .cloned()
                .unwrap_or_default();
            if !found.contains(&suggestion) {
                found.push(suggestion);
            }
        }

        // Nulls sort last, as in Cypher
        found.sort_by(|a, b| match (a.is_null(), b.is_null()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => a.to_string().cmp(&b.to_string()),
        });

        found
            .into_iter()
            .take(limit_param(query))
            .map(|s| Record::new().with("suggestion", s))
            .collect()
    }

    fn node(state: &State, query: &GraphQuery) -> Vec<Record> {
        Self::target(state, query)
            .map(|idx| vec![Self::node_row(idx, &state.nodes[idx])])
            .unwrap_or_default()
    }

    fn neighbors(state: &State, query: &GraphQuery) -> Vec<Record> {
        let Some(idx) = Self::target(state, query) else {
            return Vec::new();
        };

        state
            .edges
            .iter()
            .filter_map(|edge| {
                let other = if edge.from == idx {
                    edge.to
                } else if edge.to == idx {
                    edge.from
                } else {
                    return None;
                };
                let neighbor = &state.nodes[other];
                Some(
                    Record::new()
                        .with("rel_type", edge.rel_type.as_str())
                        .with("related_id", element_id(other))
                        .with("related_labels", neighbor.labels.clone())
                        .with("related_props", neighbor.properties.clone()),
                )
            })
            .take(limit_param(query))
            .collect()
    }

    fn lookup(state: &State, query: &GraphQuery) -> Vec<Record> {
        let QueryKind::Lookup(ref filter) = query.kind else {
            return Vec::new();
        };
        state
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| filter.matches(&node.labels, &node.properties))
            .take(limit_param(query))
            .map(|(idx, node)| Self::node_row(idx, node))
            .collect()
    }

    fn target(state: &State, query: &GraphQuery) -> Option<usize> {
        query
            .param_value("id")
            .and_then(GraphValue::as_str)
            .and_then(parse_element_id)
            .filter(|idx| *idx < state.nodes.len())
    }

    fn generated(&self, query: &GraphQuery) -> Result<Vec<Record>, GraphError> {
        let canned = self
            .generated
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match canned.get(query.text.trim()) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(message)) => Err(GraphError::Query {
                message: message.clone(),
            }),
            None => Err(GraphError::Query {
                message: format!("Invalid input: cannot evaluate '{}'", query.text),
            }),
        }
    }
}

/// Lower-cased alphanumeric runs, roughly what a standard analyzer indexes
fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn limit_param(query: &GraphQuery) -> usize {
    query
        .param_value("limit")
        .and_then(GraphValue::as_i64)
        .and_then(|l| usize::try_from(l).ok())
        .unwrap_or(usize::MAX)
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn fetch(&self, query: &GraphQuery) -> Result<Vec<Record>, GraphError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        let mut rows = match query.kind {
            QueryKind::Generated => self.generated(query)?,
            _ => {
                let state = self.read();
                match query.kind {
                    QueryKind::FullText => Self::full_text(&state, query),
                    QueryKind::Suggestions => Self::suggestions(&state, query),
                    QueryKind::Node => Self::node(&state, query),
                    QueryKind::Neighbors => Self::neighbors(&state, query),
                    QueryKind::Lookup(_) => Self::lookup(&state, query),
                    QueryKind::Generated => Vec::new(),
                }
            }
        };

        if let Some(limit) = query.row_limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn apply(&self, batch: &[Mutation]) -> Result<(), GraphError> {
        let mut state = self.write();
        // All or nothing, like a transaction
        let mut staged = state.clone();
        for mutation in batch {
            staged.apply(mutation)?;
        }
        *state = staged;
        Ok(())
    }

    async fn ping(&self) -> Result<(), GraphError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeFilter, NodeLink};

    fn farm(id: &str, name: &str) -> Mutation {
        let mut properties = Properties::new();
        properties.insert("name".into(), name.into());
        Mutation::UpsertNode {
            node: NodeRef::new("Farm", "id", id),
            properties,
            link: None,
        }
    }

    #[tokio::test]
    async fn test_full_text_orders_by_score() {
        let graph = MemoryGraph::new();
        graph.add_node(&["Animal"], [("name", "sheep dolly".into())]);
        graph.add_node(&["Animal"], [("name", "dolly".into())]);
        graph.add_node(&["Farm"], [("name", "Green Farm".into())]);

        let query = GraphQuery::new(QueryKind::FullText, "")
            .param("q", "sheep dolly")
            .param("limit", 5usize);
        let rows = graph.fetch(&query).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].str("neo4j_id"), Some("mem:0"));
        assert_eq!(rows[0].f64("score"), Some(2.0));
        assert_eq!(graph.query_count(), 1);
    }

    #[tokio::test]
    async fn test_neighbors_are_undirected() {
        let graph = MemoryGraph::new();
        let animal = graph.add_node(&["Animal"], [("name", "S123".into())]);
        let farm = graph.add_node(&["Farm"], [("name", "Green Farm".into())]);
        assert!(graph.add_edge(&animal, &farm, "BELONGS_TO"));

        let query = GraphQuery::new(QueryKind::Neighbors, "").param("id", farm.as_str());
        let rows = graph.fetch(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].str("rel_type"), Some("BELONGS_TO"));
        assert_eq!(rows[0].str("related_id"), Some(animal.as_str()));
    }

    #[tokio::test]
    async fn test_lookup_uses_filter() {
        let graph = MemoryGraph::new();
        graph.add_node(&["Animal"], [("tag", "S123".into())]);
        graph.add_node(&["Farm"], [("name", "S123".into())]);

        let filter = NodeFilter::new().with_name("S123").with_labels(["Farm"]);
        let query = GraphQuery::new(QueryKind::Lookup(filter), "").param("limit", 5usize);
        let rows = graph.fetch(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].labels("labels"), vec!["Farm".to_string()]);
    }

    #[tokio::test]
    async fn test_generated_queries() {
        let graph = MemoryGraph::new();
        graph.set_generated("MATCH (f:Farm) RETURN f.name AS name", vec![
            Record::new().with("name", "Green Farm"),
        ]);

        let ok = GraphQuery::new(QueryKind::Generated, " MATCH (f:Farm) RETURN f.name AS name ");
        assert_eq!(graph.fetch(&ok).await.unwrap().len(), 1);

        let unknown = GraphQuery::new(QueryKind::Generated, "MATCH (n RETURN n");
        assert!(matches!(
            graph.fetch(&unknown).await,
            Err(GraphError::Query { .. })
        ));
    }

    #[tokio::test]
    async fn test_apply_merges_by_key() {
        let graph = MemoryGraph::new();
        graph.apply(&[farm("F1", "Old name")]).await.unwrap();
        graph.apply(&[farm("F1", "Green Farm"), farm("F2", "Blue Farm")]).await.unwrap();

        let farms = graph.nodes_with_label("Farm");
        assert_eq!(farms.len(), 2);
        assert_eq!(farms[0]["name"], GraphValue::from("Green Farm"));
    }

    #[tokio::test]
    async fn test_apply_links_only_existing_targets() {
        let graph = MemoryGraph::new();
        graph.apply(&[farm("F1", "Green Farm")]).await.unwrap();

        let animal = |id: &str, farm_id: &str| Mutation::UpsertNode {
            node: NodeRef::new("Animal", "id", id),
            properties: Properties::new(),
            link: Some(NodeLink {
                rel_type: "BELONGS_TO",
                target: NodeRef::new("Farm", "id", farm_id),
            }),
        };
        graph.apply(&[animal("A1", "F1"), animal("A2", "F9")]).await.unwrap();

        assert_eq!(graph.nodes_with_label("Animal").len(), 2);
        assert_eq!(graph.edges_of_type("BELONGS_TO").len(), 1);
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_graph_untouched() {
        let graph = MemoryGraph::new();
        let bad = Mutation::UpsertNode {
            node: NodeRef::new("Farm", "id", GraphValue::Null),
            properties: Properties::new(),
            link: None,
        };
        assert!(graph.apply(&[farm("F1", "Green Farm"), bad]).await.is_err());
        assert_eq!(graph.node_count(), 0);
    }
}
