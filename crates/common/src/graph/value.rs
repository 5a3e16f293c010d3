//! Property values and result rows
//!
//! Node and relationship properties are untyped in the store. They are
//! carried here as a tagged scalar (plus list/map for nested results) so
//! that type information survives the round trip to JSON and to the
//! language-model context.

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Property bag of a node or relationship, ordered by key
pub type Properties = BTreeMap<String, GraphValue>;

/// A single property or column value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GraphValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<GraphValue>),
    Map(Properties),
}

impl GraphValue {
    pub fn is_null(&self) -> bool {
        matches!(self, GraphValue::Null)
    }

    /// Present means usable as a name: not null and not an empty string
    pub fn is_present(&self) -> bool {
        match self {
            GraphValue::Null => false,
            GraphValue::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GraphValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GraphValue::Float(f) => Some(*f),
            GraphValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GraphValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[GraphValue]> {
        match self {
            GraphValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Properties> {
        match self {
            GraphValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Parse a float the way Cypher's `toFloat` does: unparsable text becomes null
    pub fn parse_float(raw: &str) -> Self {
        raw.trim()
            .parse::<f64>()
            .map(GraphValue::Float)
            .unwrap_or(GraphValue::Null)
    }
}

impl fmt::Display for GraphValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphValue::Null => f.write_str("null"),
            GraphValue::Bool(b) => write!(f, "{b}"),
            GraphValue::Int(i) => write!(f, "{i}"),
            GraphValue::Float(x) => write!(f, "{x:?}"),
            GraphValue::String(s) => f.write_str(s),
            GraphValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            GraphValue::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for GraphValue {
    fn from(value: &str) -> Self {
        GraphValue::String(value.to_string())
    }
}

impl From<String> for GraphValue {
    fn from(value: String) -> Self {
        GraphValue::String(value)
    }
}

impl From<i64> for GraphValue {
    fn from(value: i64) -> Self {
        GraphValue::Int(value)
    }
}

impl From<usize> for GraphValue {
    fn from(value: usize) -> Self {
        GraphValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for GraphValue {
    fn from(value: f64) -> Self {
        GraphValue::Float(value)
    }
}

impl From<bool> for GraphValue {
    fn from(value: bool) -> Self {
        GraphValue::Bool(value)
    }
}

impl<T: Into<GraphValue>> From<Option<T>> for GraphValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(GraphValue::Null)
    }
}

impl<T: Into<GraphValue>> From<Vec<T>> for GraphValue {
    fn from(values: Vec<T>) -> Self {
        GraphValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<Properties> for GraphValue {
    fn from(map: Properties) -> Self {
        GraphValue::Map(map)
    }
}

impl Serialize for GraphValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            GraphValue::Null => serializer.serialize_unit(),
            GraphValue::Bool(b) => serializer.serialize_bool(*b),
            GraphValue::Int(i) => serializer.serialize_i64(*i),
            GraphValue::Float(f) => serializer.serialize_f64(*f),
            GraphValue::String(s) => serializer.serialize_str(s),
            GraphValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            GraphValue::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

struct GraphValueVisitor;

impl<'de> Visitor<'de> for GraphValueVisitor {
    type Value = GraphValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a graph property value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<GraphValue, E> {
        Ok(GraphValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<GraphValue, E> {
        Ok(GraphValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<GraphValue, D::Error> {
        GraphValue::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<GraphValue, E> {
        Ok(GraphValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<GraphValue, E> {
        Ok(GraphValue::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<GraphValue, E> {
        Ok(i64::try_from(v)
            .map(GraphValue::Int)
            .unwrap_or(GraphValue::Float(v as f64)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<GraphValue, E> {
        Ok(GraphValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<GraphValue, E> {
        Ok(GraphValue::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<GraphValue, E> {
        Ok(GraphValue::String(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<GraphValue, E> {
        Ok(GraphValue::List(
            v.iter().map(|b| GraphValue::Int(i64::from(*b))).collect(),
        ))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<GraphValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<GraphValue>()? {
            items.push(item);
        }
        Ok(GraphValue::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<GraphValue, A::Error> {
        let mut map = Properties::new();
        while let Some((key, value)) = access.next_entry::<String, GraphValue>()? {
            map.insert(key, value);
        }
        Ok(GraphValue::Map(map))
    }
}

impl<'de> Deserialize<'de> for GraphValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(GraphValueVisitor)
    }
}

/// One result row: column name to value, in `RETURN` order
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Record(IndexMap<String, GraphValue>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column insert
    pub fn with(mut self, column: impl Into<String>, value: impl Into<GraphValue>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&GraphValue> {
        self.0.get(column)
    }

    pub fn str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(GraphValue::as_str)
    }

    pub fn f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(GraphValue::as_f64)
    }

    /// String list column (e.g. `labels(n)`); missing or null yields empty
    pub fn labels(&self, column: &str) -> Vec<String> {
        self.get(column)
            .and_then(GraphValue::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Map column (e.g. `properties(n)`); missing or null yields empty
    pub fn properties(&self, column: &str) -> Properties {
        self.get(column)
            .and_then(GraphValue::as_map)
            .cloned()
            .unwrap_or_default()
    }

    /// Columns in the order they were returned
    pub fn columns(&self) -> impl Iterator<Item = (&String, &GraphValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_fact_formatting() {
        assert_eq!(GraphValue::from("F1").to_string(), "F1");
        assert_eq!(GraphValue::Int(4).to_string(), "4");
        assert_eq!(GraphValue::Float(3.0).to_string(), "3.0");
        assert_eq!(GraphValue::Null.to_string(), "null");
        assert_eq!(
            GraphValue::from(vec!["Animal", "Sheep"]).to_string(),
            "[Animal, Sheep]"
        );
    }

    #[test]
    fn test_presence() {
        assert!(!GraphValue::Null.is_present());
        assert!(!GraphValue::from("").is_present());
        assert!(GraphValue::from("x").is_present());
        assert!(GraphValue::Int(0).is_present());
    }

    #[test]
    fn test_parse_float_like_to_float() {
        assert_eq!(GraphValue::parse_float("21.5"), GraphValue::Float(21.5));
        assert_eq!(GraphValue::parse_float(" 2 "), GraphValue::Float(2.0));
        assert_eq!(GraphValue::parse_float(""), GraphValue::Null);
        assert_eq!(GraphValue::parse_float("n/a"), GraphValue::Null);
    }

    #[test]
    fn test_json_round_trip_keeps_types() {
        let json = serde_json::json!({
            "name": "Dolly",
            "age": 4,
            "weight": 61.5,
            "vaccinated": true,
            "owner": null,
            "tags": ["a", "b"]
        });
        let value: GraphValue = serde_json::from_value(json.clone()).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map["age"], GraphValue::Int(4));
        assert_eq!(map["weight"], GraphValue::Float(61.5));
        assert_eq!(map["owner"], GraphValue::Null);
        assert_eq!(serde_json::to_value(&value).unwrap(), json);
    }

    #[test]
    fn test_record_accessors() {
        let mut props = Properties::new();
        props.insert("name".into(), "S123".into());
        let record = Record::new()
            .with("neo4j_id", "4:x:1")
            .with("labels", vec!["Animal"])
            .with("props", props.clone())
            .with("score", 1.5);

        assert_eq!(record.str("neo4j_id"), Some("4:x:1"));
        assert_eq!(record.labels("labels"), vec!["Animal".to_string()]);
        assert_eq!(record.properties("props"), props);
        assert_eq!(record.f64("score"), Some(1.5));
        assert!(record.labels("missing").is_empty());
        assert!(record.properties("missing").is_empty());
    }

    #[test]
    fn test_record_keeps_column_order() {
        let record = Record::new()
            .with("name", "Dolly")
            .with("age", GraphValue::Int(4))
            .with("breed", "Merino");
        let columns: Vec<&str> = record.columns().map(|(c, _)| c.as_str()).collect();
        assert_eq!(columns, vec!["name", "age", "breed"]);

        let parsed: Record = serde_json::from_str(r#"{"name":"Dolly","age":4}"#).unwrap();
        let columns: Vec<&str> = parsed.columns().map(|(c, _)| c.as_str()).collect();
        assert_eq!(columns, vec!["name", "age"]);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r#"{"name":"Dolly","age":4}"#);
    }
}
