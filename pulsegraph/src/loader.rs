//! JSON pipeline loader.
//!
//! A pipeline document names its nodes, wires them with edges, and may
//! carry inline data fed to source nodes as the first change-set:
//!
//! ```json
//! {
//!   "nodes": [
//!     {"name": "points", "type": "collect"},
//!     {"name": "marks", "type": "encode",
//!      "spec": {"update": {"fill": {"value": "steelblue"}}}}
//!   ],
//!   "edges": [["points", "marks"]],
//!   "data": [{"target": "points", "insert": [{"value": 1}]}]
//! }
//! ```

use std::collections::HashMap;

use log::debug;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::EngineError;
use crate::graph::Dataflow;
use crate::model::Value;
use crate::pulse::changeset::ChangeSet;
use crate::transform::{Params, TransformRegistry};

#[derive(Debug, Deserialize)]
pub struct PipelineDoc {
    #[serde(default)]
    pub nodes: Vec<NodeDoc>,
    #[serde(default)]
    pub edges: Vec<(String, String)>,
    #[serde(default)]
    pub data: Vec<DataDoc>,
}

#[derive(Debug, Deserialize)]
pub struct NodeDoc {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub spec: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct DataDoc {
    pub target: String,
    #[serde(default)]
    pub insert: Vec<serde_json::Value>,
}

/// Build a dataflow from a pipeline document, returning the graph and
/// the name-to-id mapping for its nodes.
pub fn load_pipeline(
    json: &str,
    registry: &TransformRegistry,
) -> Result<(Dataflow, HashMap<String, Uuid>), EngineError> {
    let doc: PipelineDoc = serde_json::from_str(json)?;
    build_pipeline(&doc, registry)
}

pub fn build_pipeline(
    doc: &PipelineDoc,
    registry: &TransformRegistry,
) -> Result<(Dataflow, HashMap<String, Uuid>), EngineError> {
    let mut dataflow = Dataflow::new();
    let mut names: HashMap<String, Uuid> = HashMap::new();

    for node in &doc.nodes {
        if names.contains_key(&node.name) {
            return Err(EngineError::pipeline(format!(
                "Duplicate node name: {}",
                node.name
            )));
        }
        let transform = registry.create(&node.kind, &node.spec)?;
        let params = Params::with_values(
            node.params
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                .collect(),
        );
        let id = dataflow.add_with_params(&node.name, transform, params);
        debug!("Pipeline: added '{}' ({})", node.name, node.kind);
        names.insert(node.name.clone(), id);
    }

    for (from, to) in &doc.edges {
        let from_id = *names
            .get(from)
            .ok_or_else(|| EngineError::pipeline(format!("Unknown edge source: {}", from)))?;
        let to_id = *names
            .get(to)
            .ok_or_else(|| EngineError::pipeline(format!("Unknown edge target: {}", to)))?;
        dataflow.connect(from_id, to_id)?;
    }

    for data in &doc.data {
        let target = *names
            .get(&data.target)
            .ok_or_else(|| EngineError::pipeline(format!("Unknown data target: {}", data.target)))?;
        let mut changeset = ChangeSet::new();
        for value in &data.insert {
            let fields = value
                .as_object()
                .ok_or_else(|| EngineError::pipeline("Data values must be JSON objects"))?;
            changeset = changeset.insert(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                    .collect(),
            );
        }
        if !changeset.is_empty() {
            dataflow.pulse(target, changeset)?;
        }
    }

    Ok((dataflow, names))
}
