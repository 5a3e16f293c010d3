//! Node detail handler

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::AppState;
use provato_common::{
    errors::{AppError, Result},
    retrieval::{NodeView, Relation},
};

/// Recognised categories and their icons, in display order
pub const CATEGORIES: &[(&str, &str)] = &[
    ("Sheep", "fa-sheep"),
    ("Farm", "fa-home"),
    ("Owner", "fa-user"),
    ("Health", "fa-heart"),
    ("Breed", "fa-tag"),
    ("Vaccination", "fa-syringe"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStatus {
    pub name: String,
    pub icon: String,
    pub is_on: bool,
}

#[derive(Serialize)]
pub struct DetailResponse {
    pub node: NodeView,
    pub relations: Vec<Relation>,
    pub category_status_list: Vec<CategoryStatus>,
}

/// Checklist entries for a node's labels.
///
/// A category is listed when one of the labels names it exactly (`is_on`)
/// or when a label is a case-insensitive substring of the category name.
pub fn category_status(labels: &[String]) -> Vec<CategoryStatus> {
    CATEGORIES
        .iter()
        .filter_map(|(name, icon)| {
            let is_on = labels.iter().any(|l| l == name);
            let lowered = name.to_lowercase();
            let related = labels
                .iter()
                .any(|l| !l.is_empty() && lowered.contains(&l.to_lowercase()));

            (is_on || related).then(|| CategoryStatus {
                name: name.to_string(),
                icon: icon.to_string(),
                is_on,
            })
        })
        .collect()
}

/// Labels, properties and relations of one node
pub async fn detail(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<Json<DetailResponse>> {
    let node = state
        .retrieval
        .node_by_id(&node_id)
        .await?
        .ok_or_else(|| AppError::NodeNotFound { id: node_id.clone() })?;

    let relations = state.retrieval.node_relations(&node_id).await?;
    let category_status_list = category_status(&node.labels);

    tracing::debug!(
        node_id = %node_id,
        relations = relations.len(),
        "Node detail served"
    );

    Ok(Json(DetailResponse {
        node,
        relations,
        category_status_list,
    }))
}
