//! The dataflow graph: node table, edges, and construction operations.

pub mod analysis;
mod scheduler;

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::EngineError;
use crate::model::{RecordArena, RecordId, Value};
use crate::pulse::changeset::ChangeSet;
use crate::transform::{Params, Transform};

pub(crate) struct NodeEntry {
    pub(crate) name: String,
    pub(crate) transform: Box<dyn Transform>,
    pub(crate) params: Params,
    pub(crate) rank: u32,
    pub(crate) seq: u32,
    pub(crate) sources: Vec<Uuid>,
    pub(crate) targets: Vec<Uuid>,
    /// The materialized sequence this node last emitted, kept so a
    /// parameter-only change can reflow without re-running the upstream.
    pub(crate) last_source: Option<Vec<RecordId>>,
}

/// Result of one committed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub clock: u64,
    /// Nodes that ran this tick.
    pub ran: usize,
    /// Nodes that did not run this tick.
    pub skipped: usize,
}

/// A directed acyclic graph of transforms plus the record arena they
/// share. Ticks are driven by [`Dataflow::run`].
pub struct Dataflow {
    pub(crate) arena: RecordArena,
    pub(crate) nodes: HashMap<Uuid, NodeEntry>,
    pub(crate) order: Vec<Uuid>,
    pub(crate) clock: u64,
    pub(crate) touched: HashSet<Uuid>,
    pub(crate) staged: HashMap<Uuid, Vec<ChangeSet>>,
}

impl std::fmt::Debug for Dataflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataflow")
            .field("nodes", &self.nodes.len())
            .field("order", &self.order)
            .field("clock", &self.clock)
            .field("touched", &self.touched)
            .finish()
    }
}

impl Dataflow {
    pub fn new() -> Self {
        Self {
            arena: RecordArena::new(),
            nodes: HashMap::new(),
            order: Vec::new(),
            clock: 0,
            touched: HashSet::new(),
            staged: HashMap::new(),
        }
    }

    /// Register a node. Unconnected nodes rank after everything added
    /// before them.
    pub fn add(&mut self, name: impl Into<String>, transform: Box<dyn Transform>) -> Uuid {
        self.add_with_params(name, transform, Params::new())
    }

    pub fn add_with_params(
        &mut self,
        name: impl Into<String>,
        transform: Box<dyn Transform>,
        params: Params,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let seq = self.order.len() as u32;
        self.nodes.insert(
            id,
            NodeEntry {
                name: name.into(),
                transform,
                params,
                rank: seq,
                seq,
                sources: Vec::new(),
                targets: Vec::new(),
                last_source: None,
            },
        );
        self.order.push(id);
        id
    }

    /// Connect `from`'s output pulse to `to`'s input. Re-ranks the graph
    /// and rejects cycles.
    pub fn connect(&mut self, from: Uuid, to: Uuid) -> Result<(), EngineError> {
        if !self.nodes.contains_key(&from) {
            return Err(EngineError::graph(format!("Node not found: {}", from)));
        }
        if !self.nodes.contains_key(&to) {
            return Err(EngineError::graph(format!("Node not found: {}", to)));
        }
        if self.nodes[&from].targets.contains(&to) {
            return Err(EngineError::graph(format!(
                "Duplicate edge: {} -> {}",
                from, to
            )));
        }

        if let Some(entry) = self.nodes.get_mut(&from) {
            entry.targets.push(to);
        }
        if let Some(entry) = self.nodes.get_mut(&to) {
            entry.sources.push(from);
        }

        match self.rerank() {
            Ok(()) => Ok(()),
            Err(e) => {
                // Undo the edge so the graph stays usable.
                if let Some(entry) = self.nodes.get_mut(&from) {
                    entry.targets.pop();
                }
                if let Some(entry) = self.nodes.get_mut(&to) {
                    entry.sources.pop();
                }
                Err(e)
            }
        }
    }

    fn rerank(&mut self) -> Result<(), EngineError> {
        let targets: HashMap<Uuid, Vec<Uuid>> = self
            .nodes
            .iter()
            .map(|(id, entry)| (*id, entry.targets.clone()))
            .collect();
        let ranks = analysis::topological_ranks(&self.order, &targets)?;
        for (id, rank) in ranks {
            if let Some(entry) = self.nodes.get_mut(&id) {
                entry.rank = rank;
            }
        }
        Ok(())
    }

    /// Mark a node for re-run at the next tick even without new input.
    pub fn touch(&mut self, node: Uuid) -> Result<(), EngineError> {
        if !self.nodes.contains_key(&node) {
            return Err(EngineError::graph(format!("Node not found: {}", node)));
        }
        self.touched.insert(node);
        Ok(())
    }

    /// Update a node parameter, marking it modified and touching the
    /// node so the next tick reflows it.
    pub fn set_param(
        &mut self,
        node: Uuid,
        name: impl Into<String>,
        value: Value,
    ) -> Result<(), EngineError> {
        let entry = self
            .nodes
            .get_mut(&node)
            .ok_or_else(|| EngineError::graph(format!("Node not found: {}", node)))?;
        entry.params.set(name, value);
        self.touched.insert(node);
        Ok(())
    }

    /// Stage external input for a node, consumed at the next tick.
    pub fn pulse(&mut self, node: Uuid, changeset: ChangeSet) -> Result<(), EngineError> {
        if !self.nodes.contains_key(&node) {
            return Err(EngineError::graph(format!("Node not found: {}", node)));
        }
        self.staged.entry(node).or_default().push(changeset);
        Ok(())
    }

    pub fn arena(&self) -> &RecordArena {
        &self.arena
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_name(&self, node: Uuid) -> Option<&str> {
        self.nodes.get(&node).map(|e| e.name.as_str())
    }

    pub fn params(&self, node: Uuid) -> Option<&Params> {
        self.nodes.get(&node).map(|e| &e.params)
    }
}

impl Default for Dataflow {
    fn default() -> Self {
        Self::new()
    }
}
