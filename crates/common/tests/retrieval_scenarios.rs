//! Retrieval behaviour against an in-memory graph

use provato_common::config::RetrievalConfig;
use provato_common::graph::{GraphValue, MemoryGraph};
use provato_common::retrieval::{RetrievalEngine, RetrievalResult, SearchPlan};
use std::sync::Arc;

fn sheep_on_farm() -> Arc<MemoryGraph> {
    let graph = Arc::new(MemoryGraph::new());
    let sheep = graph.add_node(
        &["Animal"],
        [
            ("id", GraphValue::from("S123")),
            ("name", GraphValue::from("S123")),
            ("farm", GraphValue::from("F1")),
        ],
    );
    let farm = graph.add_node(
        &["Farm"],
        [("id", GraphValue::from("F1")), ("name", GraphValue::from("Green Farm"))],
    );
    graph.add_edge(&sheep, &farm, "BELONGS_TO");
    graph
}

#[tokio::test]
async fn where_is_sheep_context_mentions_farm() {
    let engine = RetrievalEngine::new(sheep_on_farm(), RetrievalConfig::default());

    let result = engine
        .search_and_expand("Where is sheep S123?", 5, 15)
        .await
        .unwrap();

    let lines: Vec<&str> = result.text_context.lines().collect();
    assert!(lines.contains(&"S123 (Animal): farm = F1"));
    assert!(lines.contains(&"S123 -[BELONGS_TO]-> Green Farm (Farm)"));
    assert_eq!(result.nodes[0].display_name, "S123");
    assert_eq!(result.facts.len(), lines.len());
}

#[tokio::test]
async fn expansion_keeps_hit_order() {
    let engine = RetrievalEngine::new(sheep_on_farm(), RetrievalConfig::default());

    let result = engine.search_and_expand("s123 green", 5, 15).await.unwrap();

    // Both nodes match one term each; the first inserted comes first
    let first_farm_fact = result
        .facts
        .iter()
        .position(|f| f.starts_with("Green Farm (Farm)"))
        .unwrap();
    let last_sheep_fact = result
        .facts
        .iter()
        .rposition(|f| f.starts_with("S123 "))
        .unwrap();
    assert!(last_sheep_fact < first_farm_fact);
}

#[tokio::test]
async fn autocomplete_is_sorted_and_filtered() {
    let graph = Arc::new(MemoryGraph::new());
    graph.add_node(&["Farm"], [("name", GraphValue::from("Farmhouse"))]);
    graph.add_node(&["Farm"], [("name", GraphValue::from("Barn"))]);
    graph.add_node(&["Farm"], [("name", GraphValue::from("Farm A"))]);
    let engine = RetrievalEngine::new(graph, RetrievalConfig::default());

    let suggestions = engine.get_suggestions("far").await.unwrap();
    assert_eq!(suggestions, vec!["Farm A".to_string(), "Farmhouse".to_string()]);
}

#[tokio::test]
async fn autocomplete_matches_owner_and_caps_results() {
    let graph = Arc::new(MemoryGraph::new());
    for i in 0..15 {
        graph.add_node(&["Animal"], [("tag", GraphValue::from(format!("T{i:02}")))]);
    }
    graph.add_node(&["Animal"], [("owner", GraphValue::from("Tasos"))]);
    let engine = RetrievalEngine::new(graph.clone(), RetrievalConfig::default());

    let suggestions = engine.get_suggestions("T").await.unwrap();
    assert_eq!(suggestions.len(), 10);
    assert_eq!(suggestions[0], "T00");

    let suggestions = engine.get_suggestions("taso").await.unwrap();
    assert_eq!(suggestions, vec!["Tasos".to_string()]);
}

#[tokio::test]
async fn search_without_match_is_empty() {
    let graph = sheep_on_farm();
    let engine = RetrievalEngine::new(graph.clone(), RetrievalConfig::default());

    assert!(engine.universal_search("kangaroo", 20).await.unwrap().is_empty());
    assert_eq!(
        engine.search_and_expand("kangaroo", 5, 15).await.unwrap(),
        RetrievalResult::empty()
    );
    assert_eq!(graph.query_count(), 2);
}

#[tokio::test]
async fn precise_lookup_by_identifier_and_label() {
    let engine = RetrievalEngine::new(sheep_on_farm(), RetrievalConfig::default());

    let mut plan = SearchPlan {
        labels: vec!["Animal".into()],
        ..SearchPlan::default()
    };
    plan.identifiers.insert("farm".into(), GraphValue::from("F1"));

    let result = engine.precise_lookup(&plan).await.unwrap();
    assert_eq!(result.nodes.len(), 1);
    assert!(result.facts.contains(&"S123: farm = F1".to_string()));
    assert!(result.facts.contains(&"S123 -[BELONGS_TO]- Green Farm".to_string()));
}

#[tokio::test]
async fn precise_lookup_ignores_unknown_identifier_fields() {
    let graph = sheep_on_farm();
    let engine = RetrievalEngine::new(graph.clone(), RetrievalConfig::default());

    let mut plan = SearchPlan::default();
    plan.identifiers
        .insert("name}) DETACH DELETE n //".into(), GraphValue::from("x"));

    let result = engine.precise_lookup(&plan).await.unwrap();
    assert_eq!(result, RetrievalResult::empty());
    assert_eq!(graph.query_count(), 0);
    assert_eq!(graph.node_count(), 2);
}

#[tokio::test]
async fn invalid_generated_query_reports_error() {
    let engine = RetrievalEngine::new(sheep_on_farm(), RetrievalConfig::default());

    let result = engine.run_generated_cypher("MATCH (n RETURN", 100).await;
    assert!(result.error.is_some_and(|e| !e.is_empty()));
    assert!(result.facts.is_empty());
    assert!(result.text_context.is_empty());
}
