//! Batched CSV loading
//!
//! Rows are read with their header, mapped to mutations and written in
//! fixed-size batches, one graph transaction per batch.

use crate::errors::{IngestionError, Result};
use crate::mapping::{CsvRow, Entity};
use provato_common::graph::{GraphStore, Mutation};
use provato_common::metrics;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Outcome of loading one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows: usize,
    pub loaded: usize,
    pub skipped: usize,
    pub batches: usize,
}

/// Writes CSV rows into the graph
pub struct BulkLoader {
    graph: Arc<dyn GraphStore>,
    batch_size: usize,
}

impl BulkLoader {
    pub fn new(graph: Arc<dyn GraphStore>, batch_size: usize) -> Self {
        Self {
            graph,
            batch_size: batch_size.max(1),
        }
    }

    /// Load one CSV file
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn load_file(&self, entity: Entity, path: &Path) -> Result<LoadReport> {
        if !path.is_file() {
            return Err(IngestionError::FileNotFound(path.display().to_string()));
        }
        let reader = csv::Reader::from_path(path).map_err(|source| IngestionError::Csv {
            path: path.display().to_string(),
            source,
        })?;
        self.load(entity, reader, &path.display().to_string()).await
    }

    /// Load CSV text from any reader
    pub async fn load_reader<R: Read>(&self, entity: Entity, input: R) -> Result<LoadReport> {
        self.load(entity, csv::Reader::from_reader(input), "<input>")
            .await
    }

    async fn load<R: Read>(
        &self,
        entity: Entity,
        mut reader: csv::Reader<R>,
        source: &str,
    ) -> Result<LoadReport> {
        let csv_error = |e: csv::Error| IngestionError::Csv {
            path: source.to_string(),
            source: e,
        };

        let headers = reader.headers().map_err(csv_error)?.clone();
        let mut report = LoadReport::default();
        let mut batch: Vec<Mutation> = Vec::with_capacity(self.batch_size);

        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            report.rows += 1;

            let row = CsvRow::new(
                headers
                    .iter()
                    .zip(record.iter())
                    .map(|(h, v)| (h.to_string(), v.to_string()))
                    .collect(),
            );

            match entity.to_mutation(&row) {
                Some(mutation) => batch.push(mutation),
                None => {
                    report.skipped += 1;
                    debug!(entity = %entity, row = report.rows, "Row skipped");
                }
            }

            if batch.len() >= self.batch_size {
                self.flush(&mut batch, &mut report).await?;
            }
        }
        self.flush(&mut batch, &mut report).await?;

        if report.skipped > 0 {
            warn!(entity = %entity, skipped = report.skipped, "Rows without identifiers were skipped");
        }
        metrics::record_loader_rows(entity.as_str(), report.loaded, report.skipped);
        info!(
            entity = %entity,
            rows = report.rows,
            loaded = report.loaded,
            batches = report.batches,
            "Upload complete"
        );

        Ok(report)
    }

    async fn flush(&self, batch: &mut Vec<Mutation>, report: &mut LoadReport) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.graph.apply(batch).await?;
        report.loaded += batch.len();
        report.batches += 1;
        batch.clear();
        Ok(())
    }

    /// Load the standard file set from `dir`.
    ///
    /// Farms come before animals, and animals before devices and contacts,
    /// so that links find their targets. Telemetry is opt-in.
    pub async fn load_directory(
        &self,
        dir: &Path,
        with_telemetry: bool,
    ) -> Result<Vec<(Entity, LoadReport)>> {
        let mut order = vec![Entity::Farms, Entity::Animals, Entity::Devices];
        if with_telemetry {
            order.extend([Entity::DeviceData, Entity::Meteo]);
        }
        order.push(Entity::Contacts);

        let mut reports = Vec::with_capacity(order.len());
        for entity in order {
            let report = self.load_file(entity, &dir.join(entity.file_name())).await?;
            reports.push((entity, report));
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provato_common::graph::{GraphValue, MemoryGraph};
    use std::fs;

    const FARMS: &str = "id,name,coordinates\nF1,Green Farm,\"39.1,22.4\"\nF2,Hill Farm,\n";
    const ANIMALS: &str = "id,id_api,name,breed,farm_id\nA1,a1,Dolly,Chios,F1\nA2,a2,Molly,,F2\nA3,a3,Polly,Lacaune,F9\n";
    const DEVICES: &str = "id,type,id_animal\nD1,collar,a1\n";
    const CONTACTS: &str = "sheep1_id_api,sheep2_id_api,distance,unit\na1,a2,4.2,m\na1,a1,0,m\n,a2,1,m\n";

    fn loader(graph: &Arc<MemoryGraph>, batch_size: usize) -> BulkLoader {
        BulkLoader::new(graph.clone(), batch_size)
    }

    #[tokio::test]
    async fn test_load_reader_batches_rows() {
        let graph = Arc::new(MemoryGraph::new());
        let input = "id,name\nF1,a\nF2,b\nF3,c\nF4,d\nF5,e\n";

        let report = tokio_test::assert_ok!(
            loader(&graph, 2)
                .load_reader(Entity::Farms, input.as_bytes())
                .await
        );

        assert_eq!(
            report,
            LoadReport {
                rows: 5,
                loaded: 5,
                skipped: 0,
                batches: 3
            }
        );
        assert_eq!(graph.node_count(), 5);
    }

    #[tokio::test]
    async fn test_reload_is_idempotent() {
        let graph = Arc::new(MemoryGraph::new());
        let loader = loader(&graph, 500);

        for _ in 0..2 {
            loader.load_reader(Entity::Farms, FARMS.as_bytes()).await.unwrap();
            loader.load_reader(Entity::Animals, ANIMALS.as_bytes()).await.unwrap();
            loader.load_reader(Entity::Contacts, CONTACTS.as_bytes()).await.unwrap();
        }

        assert_eq!(graph.node_count(), 5);
        // A3 names a farm that does not exist, so only two BELONGS_TO edges
        assert_eq!(graph.edges_of_type("BELONGS_TO").len(), 2);
        assert_eq!(graph.edges_of_type("CLOSE_TO").len(), 1);
    }

    #[tokio::test]
    async fn test_reload_overwrites_properties() {
        let graph = Arc::new(MemoryGraph::new());
        let loader = loader(&graph, 500);

        loader.load_reader(Entity::Farms, FARMS.as_bytes()).await.unwrap();
        loader
            .load_reader(Entity::Farms, "id,name\nF1,Renamed\n".as_bytes())
            .await
            .unwrap();

        let farms = graph.nodes_with_label("Farm");
        assert_eq!(farms.len(), 2);
        assert!(farms
            .iter()
            .any(|p| p.get("name") == Some(&GraphValue::from("Renamed"))));
    }

    #[tokio::test]
    async fn test_contacts_skip_incomplete_and_self_pairs() {
        let graph = Arc::new(MemoryGraph::new());
        let loader = loader(&graph, 500);
        loader.load_reader(Entity::Animals, ANIMALS.as_bytes()).await.unwrap();

        let report = loader
            .load_reader(Entity::Contacts, CONTACTS.as_bytes())
            .await
            .unwrap();

        assert_eq!(report.rows, 3);
        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped, 2);

        let edges = graph.edges_of_type("CLOSE_TO");
        assert_eq!(edges[0].get("distance"), Some(&GraphValue::Float(4.2)));
        assert_eq!(edges[0].get("unit"), Some(&GraphValue::from("m")));
    }

    #[tokio::test]
    async fn test_load_directory_in_dependency_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("farms.csv"), FARMS).unwrap();
        fs::write(dir.path().join("animals.csv"), ANIMALS).unwrap();
        fs::write(dir.path().join("devices.csv"), DEVICES).unwrap();
        fs::write(dir.path().join("farm_contacts.csv"), CONTACTS).unwrap();

        let graph = Arc::new(MemoryGraph::new());
        let reports = loader(&graph, 500)
            .load_directory(dir.path(), false)
            .await
            .unwrap();

        let order: Vec<Entity> = reports.iter().map(|(e, _)| *e).collect();
        assert_eq!(
            order,
            vec![Entity::Farms, Entity::Animals, Entity::Devices, Entity::Contacts]
        );
        assert_eq!(graph.edges_of_type("ATTACHED_TO").len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let graph = Arc::new(MemoryGraph::new());

        let result = loader(&graph, 500)
            .load_directory(dir.path(), true)
            .await;

        assert!(matches!(result, Err(IngestionError::FileNotFound(_))));
        assert_eq!(graph.node_count(), 0);
    }
}
