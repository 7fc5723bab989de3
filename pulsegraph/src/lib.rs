pub mod error;
pub mod graph;
pub mod loader;
pub mod model;
pub mod pulse;
pub mod transform;
pub mod util;

pub use error::EngineError;
pub use graph::{Dataflow, TickSummary};

use transform::TransformRegistry;

/// Build a dataflow from a pipeline JSON document and run its first
/// tick, feeding any inline data.
pub fn run_pipeline_from_json(json: &str) -> Result<(Dataflow, TickSummary), EngineError> {
    let registry = TransformRegistry::with_builtin_transforms();
    let (mut dataflow, _names) = loader::load_pipeline(json, &registry)?;
    let summary = dataflow.run()?;
    Ok((dataflow, summary))
}
