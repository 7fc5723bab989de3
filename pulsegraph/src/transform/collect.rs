//! Collect: materializes the currently-visible record sequence.

use std::collections::HashSet;

use crate::error::EngineError;
use crate::model::RecordId;
use crate::pulse::{ChangeMask, Pulse};

use super::{Params, TickContext, Transform};

/// Maintains the full record sequence for its branch of the graph and
/// emits it as the output pulse's source. Downstream REFLOW visits walk
/// this sequence. Data-source nodes are Collect nodes fed by
/// change-sets.
#[derive(Default)]
pub struct Collect {
    records: Vec<RecordId>,
}

impl Collect {
    pub fn new() -> Self {
        Self::default()
    }

    /// The materialized sequence, in arrival order.
    pub fn records(&self) -> &[RecordId] {
        &self.records
    }
}

impl Transform for Collect {
    fn name(&self) -> &str {
        "collect"
    }

    fn run(
        &mut self,
        _params: &Params,
        pulse: &Pulse,
        _ctx: &mut TickContext,
    ) -> Result<Pulse, EngineError> {
        let mut out = pulse.fork(ChangeMask::ALL);

        for id in pulse.added() {
            self.records.push(*id);
        }
        if !pulse.removed().is_empty() {
            let removed: HashSet<RecordId> = pulse.removed().iter().copied().collect();
            self.records.retain(|id| !removed.contains(id));
        }

        // Mods and declared fields pass through explicitly; forks never
        // inherit them.
        pulse.visit(ChangeMask::MOD, |id| out.push_mod(id));
        out.modifies(pulse.modified_fields().iter().cloned());

        out.set_source(self.records.clone());
        Ok(out)
    }
}
