//! Row to graph mutation mapping
//!
//! Every loader merges on a fixed identifier. Labels, key fields and
//! relation types are constants here; row values only ever travel as
//! bound parameters.

use provato_common::graph::{GraphValue, Mutation, NodeLink, NodeRef, Properties};
use std::collections::HashMap;
use std::fmt;

/// Kinds of CSV input the loaders understand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Farms,
    Animals,
    Devices,
    DeviceData,
    Meteo,
    Contacts,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Farms => "farms",
            Entity::Animals => "animals",
            Entity::Devices => "devices",
            Entity::DeviceData => "device_data",
            Entity::Meteo => "meteo",
            Entity::Contacts => "contacts",
        }
    }

    /// File name used when loading a whole directory
    pub fn file_name(&self) -> &'static str {
        match self {
            Entity::Farms => "farms.csv",
            Entity::Animals => "animals.csv",
            Entity::Devices => "devices.csv",
            Entity::DeviceData => "device_data.csv",
            Entity::Meteo => "meteo_data.csv",
            Entity::Contacts => "farm_contacts.csv",
        }
    }

    /// Mutation for one row, `None` when the row cannot identify its target
    pub fn to_mutation(&self, row: &CsvRow) -> Option<Mutation> {
        match self {
            Entity::Farms => farm(row),
            Entity::Animals => animal(row),
            Entity::Devices => device(row),
            Entity::DeviceData => device_data(row),
            Entity::Meteo => meteo(row),
            Entity::Contacts => contact(row),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One CSV record keyed by header
#[derive(Debug, Clone, Default)]
pub struct CsvRow(HashMap<String, String>);

impl CsvRow {
    pub fn new(fields: HashMap<String, String>) -> Self {
        Self(fields)
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    /// Non-empty value of the first column that has one
    fn first_filled(&self, columns: &[&str]) -> Option<&str> {
        columns
            .iter()
            .filter_map(|c| self.get(c))
            .find(|v| !v.is_empty())
    }

    /// Column as text, null when the column is absent
    fn text(&self, column: &str) -> GraphValue {
        self.get(column).map_or(GraphValue::Null, GraphValue::from)
    }

    fn text_or(&self, column: &str, default: &str) -> GraphValue {
        GraphValue::from(self.get(column).unwrap_or(default))
    }

    /// Column as float: absent counts as "0", unparsable becomes null
    fn float(&self, column: &str) -> GraphValue {
        GraphValue::parse_float(self.get(column).unwrap_or("0"))
    }
}

impl<const N: usize> From<[(&str, &str); N]> for CsvRow {
    fn from(fields: [(&str, &str); N]) -> Self {
        Self(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

const DEVICE_DATA_FLOATS: &[&str] = &[
    "acc_x",
    "acc_y",
    "acc_z",
    "std_x",
    "std_y",
    "std_z",
    "max_x",
    "max_y",
    "max_z",
    "temperature",
];

const METEO_TEXT: &[&str] = &[
    "station_timedata",
    "crawled",
    "station_city",
    "station_nomos",
    "longitude",
    "latitude",
    "direction",
];

const METEO_FLOATS: &[&str] = &[
    "temperature",
    "humidity",
    "wind",
    "yetos",
    "barometer",
    "dew_point",
    "heat_index",
    "wind_chill",
    "solar_radiation",
];

fn key(row: &CsvRow) -> Option<&str> {
    row.first_filled(&["id"])
}

/// Link to an existing node when the row names one
fn link(row: &CsvRow, column: &str, rel_type: &'static str, label: &'static str, key_field: &'static str) -> Option<NodeLink> {
    row.get(column).map(|target| NodeLink {
        rel_type,
        target: NodeRef::new(label, key_field, target),
    })
}

fn upsert(label: &'static str, id: &str, properties: Properties, link: Option<NodeLink>) -> Mutation {
    Mutation::UpsertNode {
        node: NodeRef::new(label, "id", id),
        properties,
        link,
    }
}

fn farm(row: &CsvRow) -> Option<Mutation> {
    let id = key(row)?;
    let mut properties = Properties::new();
    properties.insert("name".into(), row.text_or("name", ""));
    properties.insert("coordinates".into(), row.text_or("coordinates", ""));
    Some(upsert("Farm", id, properties, None))
}

fn animal(row: &CsvRow) -> Option<Mutation> {
    let id = key(row)?;
    let properties = ["id_api", "name", "birth", "type", "sex", "breed", "breed_short"]
        .iter()
        .map(|c| (c.to_string(), row.text(c)))
        .collect();
    let link = link(row, "farm_id", "BELONGS_TO", "Farm", "id");
    Some(upsert("Animal", id, properties, link))
}

fn device(row: &CsvRow) -> Option<Mutation> {
    let id = key(row)?;
    let mut properties = Properties::new();
    properties.insert("type".into(), row.text("type"));
    let link = link(row, "id_animal", "ATTACHED_TO", "Animal", "id_api");
    Some(upsert("Device", id, properties, link))
}

fn device_data(row: &CsvRow) -> Option<Mutation> {
    let id = key(row)?;
    let mut properties: Properties = DEVICE_DATA_FLOATS
        .iter()
        .map(|c| (c.to_string(), row.float(c)))
        .collect();
    properties.insert("created".into(), row.text("created"));
    properties.insert("coordinates".into(), row.text_or("coordinates", ""));
    let link = link(row, "id_api", "FROM_DEVICE", "Device", "id");
    Some(upsert("DeviceData", id, properties, link))
}

/// Readings without an id are keyed by farm and station time
pub fn meteo_id(row: &CsvRow) -> String {
    match key(row) {
        Some(id) => id.to_string(),
        None => format!(
            "{}_{}",
            row.get("farm_id_api").unwrap_or("unknown"),
            row.get("station_timedata").unwrap_or("unknown")
        ),
    }
}

fn meteo(row: &CsvRow) -> Option<Mutation> {
    let id = meteo_id(row);
    let mut properties: Properties = METEO_TEXT
        .iter()
        .map(|c| (c.to_string(), row.text(c)))
        .collect();
    for column in METEO_FLOATS {
        properties.insert(column.to_string(), row.float(column));
    }
    let link = link(row, "farm_id_api", "FROM_FARM", "Farm", "id_api");
    Some(upsert("MeteoData", &id, properties, link))
}

fn contact(row: &CsvRow) -> Option<Mutation> {
    let first = row.first_filled(&["sheep1_id_api", "id_api_1"])?;
    let second = row.first_filled(&["sheep2_id_api", "id_api_2"])?;
    if first == second {
        return None;
    }

    let mut properties = Properties::new();
    properties.insert("distance".into(), row.float("distance"));
    properties.insert(
        "unit".into(),
        GraphValue::from(row.first_filled(&["unit"]).unwrap_or("m")),
    );

    Some(Mutation::Connect {
        from: NodeRef::new("Animal", "id_api", first),
        to: NodeRef::new("Animal", "id_api", second),
        rel_type: "CLOSE_TO",
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upserted(mutation: Option<Mutation>) -> (NodeRef, Properties, Option<NodeLink>) {
        match mutation {
            Some(Mutation::UpsertNode {
                node,
                properties,
                link,
            }) => (node, properties, link),
            other => panic!("expected upsert, got {:?}", other),
        }
    }

    #[test]
    fn test_farm_defaults_missing_columns_to_empty() {
        let (node, properties, link) = upserted(Entity::Farms.to_mutation(&CsvRow::from([("id", "F1")])));
        assert_eq!(node, NodeRef::new("Farm", "id", "F1"));
        assert_eq!(properties["name"], GraphValue::from(""));
        assert_eq!(properties["coordinates"], GraphValue::from(""));
        assert!(link.is_none());
    }

    #[test]
    fn test_row_without_id_is_skipped() {
        assert!(Entity::Farms.to_mutation(&CsvRow::from([("name", "x")])).is_none());
        assert!(Entity::Animals.to_mutation(&CsvRow::from([("id", "")])).is_none());
    }

    #[test]
    fn test_animal_links_to_farm() {
        let row = CsvRow::from([("id", "A1"), ("name", "Dolly"), ("farm_id", "F1")]);
        let (_, properties, link) = upserted(Entity::Animals.to_mutation(&row));

        assert_eq!(properties["name"], GraphValue::from("Dolly"));
        assert!(properties["breed"].is_null());
        let link = link.unwrap();
        assert_eq!(link.rel_type, "BELONGS_TO");
        assert_eq!(link.target, NodeRef::new("Farm", "id", "F1"));
    }

    #[test]
    fn test_device_data_floats() {
        let row = CsvRow::from([("id", "DD1"), ("acc_x", "1.5"), ("acc_y", "n/a"), ("id_api", "D1")]);
        let (_, properties, link) = upserted(Entity::DeviceData.to_mutation(&row));

        assert_eq!(properties["acc_x"], GraphValue::Float(1.5));
        assert!(properties["acc_y"].is_null());
        assert_eq!(properties["acc_z"], GraphValue::Float(0.0));
        assert_eq!(link.unwrap().target, NodeRef::new("Device", "id", "D1"));
    }

    #[test]
    fn test_meteo_id_fallback() {
        assert_eq!(meteo_id(&CsvRow::from([("id", "M1")])), "M1");
        assert_eq!(
            meteo_id(&CsvRow::from([("id", ""), ("farm_id_api", "7"), ("station_timedata", "2024-01-01")])),
            "7_2024-01-01"
        );
        assert_eq!(meteo_id(&CsvRow::default()), "unknown_unknown");
    }

    #[test]
    fn test_contact_columns_and_unit() {
        let row = CsvRow::from([("id_api_1", "a1"), ("sheep2_id_api", "a2"), ("distance", "3.5")]);
        match Entity::Contacts.to_mutation(&row) {
            Some(Mutation::Connect {
                from,
                to,
                rel_type,
                properties,
            }) => {
                assert_eq!(from, NodeRef::new("Animal", "id_api", "a1"));
                assert_eq!(to, NodeRef::new("Animal", "id_api", "a2"));
                assert_eq!(rel_type, "CLOSE_TO");
                assert_eq!(properties["distance"], GraphValue::Float(3.5));
                assert_eq!(properties["unit"], GraphValue::from("m"));
            }
            other => panic!("expected connect, got {:?}", other),
        }
    }

    #[test]
    fn test_contact_needs_two_distinct_animals() {
        assert!(Entity::Contacts.to_mutation(&CsvRow::from([("id_api_1", "a1")])).is_none());
        assert!(Entity::Contacts
            .to_mutation(&CsvRow::from([("id_api_1", "a1"), ("id_api_2", "a1")]))
            .is_none());
    }
}
