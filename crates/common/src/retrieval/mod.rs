//! Retrieval engine
//!
//! Turns a free-text or structured query into a bounded list of facts
//! about the graph. Four modes:
//! - Full-text search over every indexed node
//! - Autocomplete over name-like fields
//! - Search followed by neighbourhood expansion
//! - Exact lookup from a search plan
//!
//! plus verbatim execution of externally generated queries.
//!
//! Fixed queries propagate their errors; a failed generated query is
//! reported inside the returned [`RetrievalResult`].

mod facts;

pub use facts::{
    display_name, NodeView, Relation, RetrievalResult, SearchHit, SearchPlan,
    DISPLAY_NAME_FIELDS, NEIGHBOR_DETAIL_KEYS, UNNAMED,
};

use crate::config::RetrievalConfig;
use crate::graph::{GraphError, GraphQuery, GraphStore, GraphValue, NodeFilter, QueryKind, FULLTEXT_INDEX};
use crate::metrics;
use facts::{attribute_fact, outgoing_fact, property_fact, undirected_fact};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const NODE_COLUMNS: &str = "elementId(n) AS neo4j_id, labels(n) AS labels, properties(n) AS props";

const RELATION_COLUMNS: &str = "type(r) AS rel_type,\n       \
     elementId(m) AS related_id,\n       \
     labels(m) AS related_labels,\n       \
     properties(m) AS related_props";

/// Graph-backed retrieval
#[derive(Clone)]
pub struct RetrievalEngine {
    graph: Arc<dyn GraphStore>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(graph: Arc<dyn GraphStore>, config: RetrievalConfig) -> Self {
        Self { graph, config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn graph(&self) -> &Arc<dyn GraphStore> {
        &self.graph
    }

    /// Full-text search, highest score first. The input is lower-cased and
    /// handed to the index as is.
    #[instrument(skip(self))]
    pub async fn universal_search(&self, text: &str, limit: usize) -> Result<Vec<SearchHit>, GraphError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query = GraphQuery::new(
            QueryKind::FullText,
            format!(
                "CALL db.index.fulltext.queryNodes('{FULLTEXT_INDEX}', $q)\n\
                 YIELD node AS n, score\n\
                 RETURN {NODE_COLUMNS}, score\n\
                 ORDER BY score DESC\n\
                 LIMIT $limit"
            ),
        )
        .param("q", text.to_lowercase())
        .param("limit", limit);

        let rows = self.graph.fetch(&query).await?;
        let hits: Vec<SearchHit> = rows.iter().map(SearchHit::from_row).collect();

        metrics::record_retrieval("search", hits.len());
        debug!(hits = hits.len(), "Full-text search complete");
        Ok(hits)
    }

    /// Up to `suggestion_limit` distinct names containing `partial`,
    /// case-insensitive, sorted
    #[instrument(skip(self))]
    pub async fn get_suggestions(&self, partial: &str) -> Result<Vec<String>, GraphError> {
        if partial.trim().is_empty() {
            return Ok(Vec::new());
        }

        let fields = DISPLAY_NAME_FIELDS
            .iter()
            .map(|f| format!("'{f}'"))
            .collect::<Vec<_>>()
            .join(",");
        let coalesce = DISPLAY_NAME_FIELDS
            .iter()
            .map(|f| format!("n.{f}"))
            .collect::<Vec<_>>()
            .join(", ");

        let query = GraphQuery::new(
            QueryKind::Suggestions,
            format!(
                "MATCH (n)\n\
                 WHERE any(key IN [{fields}] WHERE toLower(toString(n[key])) CONTAINS $partial)\n\
                 WITH coalesce({coalesce}) AS suggestion\n\
                 RETURN DISTINCT suggestion\n\
                 ORDER BY suggestion\n\
                 LIMIT $limit"
            ),
        )
        .param("partial", partial.to_lowercase())
        .param("limit", self.config.suggestion_limit);

        let suggestions: Vec<String> = self
            .graph
            .fetch(&query)
            .await?
            .iter()
            .filter_map(|row| row.get("suggestion"))
            .filter(|value| value.is_present())
            .map(|value| value.to_string())
            .take(self.config.suggestion_limit)
            .collect();

        metrics::record_retrieval("suggestions", suggestions.len());
        Ok(suggestions)
    }

    /// Search, then describe each hit and its neighbourhood
    #[instrument(skip(self))]
    pub async fn search_and_expand(
        &self,
        question: &str,
        top_k: usize,
        neighbor_limit: usize,
    ) -> Result<RetrievalResult, GraphError> {
        let hits = self.universal_search(question, top_k).await?;
        if hits.is_empty() {
            return Ok(RetrievalResult::empty());
        }

        let mut facts = Vec::new();
        for hit in &hits {
            for (key, value) in &hit.properties {
                facts.push(property_fact(&hit.display_name, &hit.labels, key, value));
            }

            for relation in self.neighbors(&hit.node_id, Some(neighbor_limit)).await? {
                facts.push(outgoing_fact(&hit.display_name, &relation));
                for key in NEIGHBOR_DETAIL_KEYS {
                    if let Some(value) = relation.related_properties.get(*key) {
                        facts.push(attribute_fact(&relation.display_name, key, value));
                    }
                }
            }
        }

        metrics::record_retrieval("expand", facts.len());
        Ok(RetrievalResult::new(hits, facts))
    }

    /// Exact filtered lookup bounded by `lookup_limit` nodes and
    /// `lookup_neighbor_limit` relations each. An empty plan issues no query.
    #[instrument(skip(self))]
    pub async fn precise_lookup(&self, plan: &SearchPlan) -> Result<RetrievalResult, GraphError> {
        let mut filter = NodeFilter::new()
            .with_name(plan.name.clone().unwrap_or_default())
            .with_labels(plan.labels.iter().cloned());
        for (field, value) in &plan.identifiers {
            filter.add_identifier(field, value.clone());
        }

        let Some(rendered) = filter.render() else {
            return Ok(RetrievalResult::empty());
        };

        let query = GraphQuery::new(
            QueryKind::Lookup(filter),
            format!(
                "MATCH (n)\n\
                 WHERE {}\n\
                 RETURN {NODE_COLUMNS}\n\
                 LIMIT $limit",
                rendered.clause
            ),
        )
        .params(rendered.params)
        .param("limit", self.config.lookup_limit);

        let hits: Vec<SearchHit> = self
            .graph
            .fetch(&query)
            .await?
            .iter()
            .map(SearchHit::from_row)
            .collect();

        let mut facts = Vec::new();
        for hit in &hits {
            for (key, value) in &hit.properties {
                if plan.fields.is_empty() || plan.fields.iter().any(|f| f == key) {
                    facts.push(attribute_fact(&hit.display_name, key, value));
                }
            }
            let neighbor_limit = Some(self.config.lookup_neighbor_limit);
            for relation in self.neighbors(&hit.node_id, neighbor_limit).await? {
                facts.push(undirected_fact(&hit.display_name, &relation));
            }
        }

        metrics::record_retrieval("lookup", facts.len());
        Ok(RetrievalResult::new(hits, facts))
    }

    /// Run externally authored query text verbatim. Never fails: execution
    /// errors are carried in [`RetrievalResult::error`].
    #[instrument(skip(self))]
    pub async fn run_generated_cypher(&self, cypher: &str, limit: usize) -> RetrievalResult {
        if cypher.trim().is_empty() {
            return RetrievalResult::failed("Empty query");
        }

        let query = GraphQuery::new(QueryKind::Generated, cypher).limit_rows(limit);
        let rows = match self.graph.fetch(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Generated query failed");
                metrics::record_retrieval("generated_error", 0);
                return RetrievalResult::failed(e.to_string());
            }
        };

        let facts: Vec<String> = rows
            .iter()
            .flat_map(|row| {
                row.columns()
                    .map(|(column, value)| format!("{}: {}", column, value))
                    .collect::<Vec<_>>()
            })
            .collect();

        metrics::record_retrieval("generated", facts.len());
        RetrievalResult::new(Vec::new(), facts)
    }

    /// Single node by element id
    pub async fn node_by_id(&self, id: &str) -> Result<Option<NodeView>, GraphError> {
        let query = GraphQuery::new(
            QueryKind::Node,
            format!("MATCH (n)\nWHERE elementId(n) = $id\nRETURN {NODE_COLUMNS}"),
        )
        .param("id", id)
        .limit_rows(1);

        let rows = self.graph.fetch(&query).await?;
        Ok(rows.first().map(|row| {
            let hit = SearchHit::from_row(row);
            NodeView {
                node_id: if hit.node_id.is_empty() { id.to_string() } else { hit.node_id },
                labels: hit.labels,
                properties: hit.properties,
                display_name: hit.display_name,
            }
        }))
    }

    /// Every relationship of a node, in either direction
    pub async fn node_relations(&self, id: &str) -> Result<Vec<Relation>, GraphError> {
        self.neighbors(id, None).await
    }

    async fn neighbors(&self, id: &str, limit: Option<usize>) -> Result<Vec<Relation>, GraphError> {
        let mut text = format!(
            "MATCH (n)-[r]-(m)\n\
             WHERE elementId(n) = $id\n\
             RETURN {RELATION_COLUMNS}"
        );
        let mut query_params = vec![("id".to_string(), GraphValue::from(id))];
        if let Some(limit) = limit {
            text.push_str("\nLIMIT $limit");
            query_params.push(("limit".to_string(), GraphValue::from(limit)));
        }

        let query = GraphQuery::new(QueryKind::Neighbors, text).params(query_params);
        let rows = self.graph.fetch(&query).await?;
        Ok(rows.iter().map(Relation::from_row).collect())
    }
}
