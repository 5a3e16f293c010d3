//! Result shapes and fact formatting
//!
//! Provides:
//! - Display-name derivation
//! - Search hits, node views and relations
//! - The uniform retrieval result
//! - Fact sentence builders

use crate::graph::{GraphValue, Properties, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fallback display name
pub const UNNAMED: &str = "(Unnamed)";

/// Candidate properties for a display name, highest priority first
pub const DISPLAY_NAME_FIELDS: &[&str] = &["name", "tag", "breed", "owner"];

/// Neighbour properties repeated as extra facts during expansion
pub const NEIGHBOR_DETAIL_KEYS: &[&str] = &[
    "breed",
    "age",
    "owner",
    "farm",
    "health_status",
    "last_vaccination",
];

/// First present of name, tag, breed, owner; otherwise "(Unnamed)"
pub fn display_name(properties: &Properties) -> String {
    DISPLAY_NAME_FIELDS
        .iter()
        .filter_map(|field| properties.get(*field))
        .find(|value| value.is_present())
        .map(|value| value.to_string())
        .unwrap_or_else(|| UNNAMED.to_string())
}

/// A ranked node returned by full-text search or exact lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Element id assigned by the store
    #[serde(rename = "neo4j_id")]
    pub node_id: String,

    pub labels: Vec<String>,

    #[serde(rename = "props")]
    pub properties: Properties,

    /// Relevance score, absent for exact lookups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    pub display_name: String,
}

impl SearchHit {
    /// Build from a `neo4j_id, labels, props[, score]` row
    pub(crate) fn from_row(row: &Record) -> Self {
        let properties = row.properties("props");
        Self {
            node_id: row.str("neo4j_id").unwrap_or_default().to_string(),
            labels: row.labels("labels"),
            display_name: display_name(&properties),
            properties,
            score: row.f64("score"),
        }
    }
}

/// Single node with its display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    #[serde(rename = "neo4j_id")]
    pub node_id: String,
    pub labels: Vec<String>,
    #[serde(rename = "props")]
    pub properties: Properties,
    pub display_name: String,
}

/// One relationship seen from a node, in either direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub rel_type: String,
    pub related_id: String,
    pub related_labels: Vec<String>,
    #[serde(skip)]
    pub related_properties: Properties,
    pub display_name: String,
}

impl Relation {
    /// Build from a `rel_type, related_id, related_labels, related_props` row
    pub(crate) fn from_row(row: &Record) -> Self {
        let related_properties = row.properties("related_props");
        Self {
            rel_type: row.str("rel_type").unwrap_or_default().to_string(),
            related_id: row.str("related_id").unwrap_or_default().to_string(),
            related_labels: row.labels("related_labels"),
            display_name: display_name(&related_properties),
            related_properties,
        }
    }
}

/// Structured exact-lookup request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchPlan {
    pub name: Option<String>,
    pub labels: Vec<String>,
    pub identifiers: BTreeMap<String, GraphValue>,
    /// Restrict property facts to these keys; empty means all
    pub fields: Vec<String>,
}

/// Uniform output of every retrieval operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub nodes: Vec<SearchHit>,
    pub facts: Vec<String>,
    pub text_context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(nodes: Vec<SearchHit>, facts: Vec<String>) -> Self {
        let text_context = facts.join("\n");
        Self {
            nodes,
            facts,
            text_context,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

pub(crate) fn property_fact(name: &str, labels: &[String], key: &str, value: &GraphValue) -> String {
    format!("{} ({}): {} = {}", name, labels.join("|"), key, value)
}

pub(crate) fn outgoing_fact(name: &str, relation: &Relation) -> String {
    format!(
        "{} -[{}]-> {} ({})",
        name,
        relation.rel_type,
        relation.display_name,
        relation.related_labels.join("|")
    )
}

pub(crate) fn undirected_fact(name: &str, relation: &Relation) -> String {
    format!("{} -[{}]- {}", name, relation.rel_type, relation.display_name)
}

pub(crate) fn attribute_fact(name: &str, key: &str, value: &GraphValue) -> String {
    format!("{}: {} = {}", name, key, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), GraphValue::from(*v)))
            .collect()
    }

    #[test]
    fn test_display_name_priority() {
        assert_eq!(display_name(&props(&[("owner", "Nikos"), ("tag", "T9")])), "T9");
        assert_eq!(display_name(&props(&[("breed", "Merino"), ("owner", "Nikos")])), "Merino");
        assert_eq!(display_name(&props(&[("name", ""), ("owner", "Nikos")])), "Nikos");
        assert_eq!(display_name(&Properties::new()), UNNAMED);
    }

    #[test]
    fn test_display_name_skips_null() {
        let mut p = props(&[("tag", "T1")]);
        p.insert("name".into(), GraphValue::Null);
        assert_eq!(display_name(&p), "T1");
    }

    #[test]
    fn test_fact_formats() {
        let relation = Relation {
            rel_type: "BELONGS_TO".into(),
            related_id: "mem:1".into(),
            related_labels: vec!["Farm".into()],
            related_properties: props(&[("name", "Green Farm")]),
            display_name: "Green Farm".into(),
        };
        assert_eq!(
            property_fact("S123", &["Animal".into()], "farm", &"F1".into()),
            "S123 (Animal): farm = F1"
        );
        assert_eq!(outgoing_fact("S123", &relation), "S123 -[BELONGS_TO]-> Green Farm (Farm)");
        assert_eq!(undirected_fact("S123", &relation), "S123 -[BELONGS_TO]- Green Farm");
    }

    #[test]
    fn test_result_joins_facts() {
        let result = RetrievalResult::new(Vec::new(), vec!["a".into(), "b".into()]);
        assert_eq!(result.text_context, "a\nb");
        assert!(RetrievalResult::empty().is_empty());
        assert!(RetrievalResult::failed("boom").error.is_some());
    }

    #[test]
    fn test_plan_deserializes_partial_json() {
        let plan: SearchPlan =
            serde_json::from_str(r#"{"labels": ["Animal"], "identifiers": {"farm": "F1"}}"#).unwrap();
        assert!(plan.name.is_none());
        assert_eq!(plan.identifiers["farm"], GraphValue::from("F1"));
        assert!(plan.fields.is_empty());
    }

    fn field_value() -> impl Strategy<Value = Option<String>> {
        prop_oneof![Just(None), Just(Some(String::new())), "[a-z]{1,6}".prop_map(Some)]
    }

    proptest! {
        #[test]
        fn prop_display_name_is_first_present(
            name in field_value(),
            tag in field_value(),
            breed in field_value(),
            owner in field_value(),
        ) {
            let candidates = [("name", &name), ("tag", &tag), ("breed", &breed), ("owner", &owner)];
            let mut properties = Properties::new();
            for (key, value) in candidates.iter() {
                if let Some(v) = value {
                    properties.insert(key.to_string(), GraphValue::from(v.as_str()));
                }
            }

            let expected = candidates
                .iter()
                .filter_map(|(_, v)| v.as_ref())
                .find(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| UNNAMED.to_string());

            prop_assert_eq!(display_name(&properties), expected.clone());
            // Deterministic
            prop_assert_eq!(display_name(&properties), expected);
        }
    }
}
