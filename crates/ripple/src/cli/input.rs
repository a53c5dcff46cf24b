//! Reading graph and task documents from disk.

use crate::domain::GraphBatch;
use crate::error::Result;
use crate::graph::GraphStore;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Whether `path` should be parsed as YAML rather than JSON.
fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

/// Parse a JSON or YAML document, chosen by file extension.
pub async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).await?;
    if is_yaml(path) {
        Ok(serde_yaml::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(&content)?)
    }
}

/// Build a graph from a batch file.
pub async fn load_graph(path: &Path) -> Result<GraphStore> {
    let batch: GraphBatch = read_document(path).await?;
    let graph = GraphStore::from_batch(batch)?;
    debug!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "loaded graph"
    );
    Ok(graph)
}
