//! Conjunctive node filter for exact lookups
//!
//! Only clause structure is ever interpolated into the query text: the
//! node alias, fixed operators, and identifier field names taken from
//! [`IDENTIFIER_FIELDS`]. Every value, including label names, travels as
//! a bound parameter.

use super::value::{GraphValue, Properties};
use serde::{Deserialize, Serialize};

/// Property names an identifier condition may target
pub const IDENTIFIER_FIELDS: &[&str] = &[
    "id",
    "id_api",
    "name",
    "tag",
    "breed",
    "breed_short",
    "owner",
    "farm",
    "farm_id",
    "farm_id_api",
    "type",
    "sex",
    "station_city",
    "station_nomos",
];

/// Fields compared against a lookup name
pub const NAME_FIELDS: &[&str] = &["name", "tag", "breed"];

/// Filter over a single node alias `n`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeFilter {
    /// Equality against any of [`NAME_FIELDS`]
    pub name: Option<String>,

    /// Field equality, in insertion order
    pub identifiers: Vec<(String, GraphValue)>,

    /// Label membership, any of
    pub labels: Vec<String>,
}

/// Rendered WHERE body with its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFilter {
    pub clause: String,
    pub params: Vec<(String, GraphValue)>,
}

impl NodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.is_empty() { None } else { Some(name) };
        self
    }

    /// Adds an identifier condition. Empty values and fields outside the
    /// allow-list are dropped; returns whether the condition was kept.
    pub fn add_identifier(&mut self, field: &str, value: GraphValue) -> bool {
        if !value.is_present() {
            return false;
        }
        if !IDENTIFIER_FIELDS.contains(&field) {
            tracing::warn!(field = %field, "Identifier field not allowed in lookup, skipping");
            return false;
        }
        self.identifiers.push((field.to_string(), value));
        true
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels
            .extend(labels.into_iter().map(Into::into).filter(|l| !l.is_empty()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.identifiers.is_empty() && self.labels.is_empty()
    }

    /// Render the conjunction, or `None` when no condition can be built
    pub fn render(&self) -> Option<RenderedFilter> {
        if self.is_empty() {
            return None;
        }

        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(ref name) = self.name {
            let alternatives: Vec<String> = NAME_FIELDS
                .iter()
                .map(|field| format!("n.{field} = $name"))
                .collect();
            conditions.push(format!("({})", alternatives.join(" OR ")));
            params.push(("name".to_string(), GraphValue::from(name.as_str())));
        }

        for (i, (field, value)) in self.identifiers.iter().enumerate() {
            let param = format!("ident_{i}");
            conditions.push(format!("n.`{field}` = ${param}"));
            params.push((param, value.clone()));
        }

        if !self.labels.is_empty() {
            conditions.push("any(label IN labels(n) WHERE label IN $labels)".to_string());
            params.push((
                "labels".to_string(),
                GraphValue::from(self.labels.clone()),
            ));
        }

        Some(RenderedFilter {
            clause: conditions.join(" AND "),
            params,
        })
    }

    /// Evaluate against a node held in memory
    pub fn matches(&self, labels: &[String], properties: &Properties) -> bool {
        if self.is_empty() {
            return false;
        }

        if let Some(ref name) = self.name {
            let hit = NAME_FIELDS
                .iter()
                .any(|field| properties.get(*field).and_then(GraphValue::as_str) == Some(name.as_str()));
            if !hit {
                return false;
            }
        }

        for (field, value) in &self.identifiers {
            if properties.get(field) != Some(value) {
                return false;
            }
        }

        if !self.labels.is_empty() && !labels.iter().any(|l| self.labels.contains(l)) {
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_renders_nothing() {
        assert!(NodeFilter::new().render().is_none());
        assert!(NodeFilter::new().with_name("").render().is_none());
    }

    #[test]
    fn test_name_only() {
        let rendered = NodeFilter::new().with_name("Dolly").render().unwrap();
        assert_eq!(
            rendered.clause,
            "(n.name = $name OR n.tag = $name OR n.breed = $name)"
        );
        assert_eq!(
            rendered.params,
            vec![("name".to_string(), GraphValue::from("Dolly"))]
        );
    }

    #[test]
    fn test_labels_are_bound_not_interpolated() {
        let rendered = NodeFilter::new()
            .with_labels(["Farm", "x' OR 1=1 //"])
            .render()
            .unwrap();
        assert!(!rendered.clause.contains("Farm"));
        assert!(!rendered.clause.contains("1=1"));
        assert_eq!(rendered.params[0].0, "labels");
    }

    #[test]
    fn test_identifier_allow_list() {
        let mut filter = NodeFilter::new();
        assert!(filter.add_identifier("id", "S123".into()));
        assert!(!filter.add_identifier("id}) DETACH DELETE n //", "x".into()));
        assert!(!filter.add_identifier("farm_id", "".into()));
        assert!(!filter.add_identifier("farm_id", GraphValue::Null));

        let rendered = filter.render().unwrap();
        assert_eq!(rendered.clause, "n.`id` = $ident_0");
        assert_eq!(rendered.params.len(), 1);
    }

    #[test]
    fn test_conjunction_order() {
        let mut filter = NodeFilter::new().with_name("S123").with_labels(["Animal"]);
        filter.add_identifier("farm", "F1".into());
        let rendered = filter.render().unwrap();
        let parts: Vec<&str> = rendered.clause.split(" AND ").collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[0].starts_with("(n.name"));
        assert_eq!(parts[1], "n.`farm` = $ident_0");
        assert!(parts[2].starts_with("any(label"));
    }

    #[test]
    fn test_matches_in_memory() {
        let mut props = Properties::new();
        props.insert("tag".into(), "S123".into());
        props.insert("farm".into(), "F1".into());
        let labels = vec!["Animal".to_string()];

        let mut filter = NodeFilter::new().with_name("S123").with_labels(["Animal", "Sheep"]);
        filter.add_identifier("farm", "F1".into());
        assert!(filter.matches(&labels, &props));

        let other = NodeFilter::new().with_labels(["Farm"]);
        assert!(!other.matches(&labels, &props));
        assert!(!NodeFilter::new().matches(&labels, &props));
    }
}
