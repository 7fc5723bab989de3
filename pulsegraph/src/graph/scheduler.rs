//! Tick execution: rank-ordered propagation over the affected subgraph.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use log::{debug, trace};
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::RecordId;
use crate::pulse::Pulse;
use crate::transform::TickContext;
use crate::util::timing::TickTimer;

use super::{Dataflow, TickSummary};

impl Dataflow {
    /// Run one propagation tick.
    ///
    /// Staged change-sets are materialized into input pulses, then every
    /// node reachable from a pulsed or touched node runs once, in
    /// topological rank order. Nodes whose inputs produced no changes
    /// are skipped. Either the whole tick commits or, on the first
    /// transform error, the tick is rolled back and the error surfaced.
    pub fn run(&mut self) -> Result<TickSummary, EngineError> {
        let clock = self.clock + 1;
        let _timer = TickTimer::new(clock);

        let staged = std::mem::take(&mut self.staged);
        let touched = std::mem::take(&mut self.touched);

        let mut inserted: Vec<RecordId> = Vec::new();
        let mut retired: Vec<RecordId> = Vec::new();
        let mut inputs: HashMap<Uuid, Pulse> = HashMap::new();

        for (node, changesets) in staged {
            let mut pulse = Pulse::new(clock);
            for changeset in changesets {
                if let Err(e) =
                    changeset.apply(&mut self.arena, &mut pulse, clock, &mut inserted, &mut retired)
                {
                    self.rollback(&inserted);
                    return Err(e);
                }
            }
            inputs.insert(node, pulse);
        }

        let mut heap: BinaryHeap<Reverse<(u32, u32, Uuid)>> = BinaryHeap::new();
        let mut enqueued: HashSet<Uuid> = HashSet::new();
        for id in inputs.keys().copied().chain(touched) {
            if enqueued.insert(id) {
                if let Some(entry) = self.nodes.get(&id) {
                    heap.push(Reverse((entry.rank, entry.seq, id)));
                }
            }
        }

        let mut done: HashSet<Uuid> = HashSet::new();
        let mut ran = 0usize;

        while let Some(Reverse((_, _, id))) = heap.pop() {
            if !done.insert(id) {
                continue;
            }

            let input = match inputs.remove(&id) {
                Some(pulse) => pulse,
                None => {
                    // Touched without new input: run against the
                    // upstream's last materialized sequence so REFLOW
                    // has a visit domain.
                    let mut pulse = Pulse::new(clock);
                    let upstream_source = self.nodes.get(&id).and_then(|entry| {
                        entry
                            .sources
                            .iter()
                            .find_map(|s| self.nodes.get(s).and_then(|e| e.last_source.clone()))
                    });
                    if let Some(source) = upstream_source {
                        pulse.set_source(source);
                    }
                    pulse
                }
            };

            let Some(entry) = self.nodes.get_mut(&id) else {
                continue;
            };
            let mut ctx = TickContext {
                arena: &mut self.arena,
                clock,
            };
            let out = match entry.transform.run(&entry.params, &input, &mut ctx) {
                Ok(out) => out,
                Err(e) => {
                    debug!("Tick {} aborted by '{}': {}", clock, entry.name, e);
                    self.rollback(&inserted);
                    return Err(e);
                }
            };
            ran += 1;

            if let Some(source) = out.source() {
                entry.last_source = Some(source.to_vec());
            }
            let name = entry.name.clone();
            let targets = entry.targets.clone();

            if out.propagates() {
                for target in targets {
                    match inputs.entry(target) {
                        std::collections::hash_map::Entry::Occupied(mut slot) => {
                            slot.get_mut().absorb(&out);
                        }
                        std::collections::hash_map::Entry::Vacant(slot) => {
                            slot.insert(out.clone());
                        }
                    }
                    if let Some(target_entry) = self.nodes.get(&target) {
                        heap.push(Reverse((target_entry.rank, target_entry.seq, target)));
                    }
                }
            } else {
                trace!("'{}' produced no changes; downstream skipped", name);
            }
        }

        // Commit.
        for id in retired {
            self.arena.remove(id);
        }
        for id in &done {
            if let Some(entry) = self.nodes.get_mut(id) {
                entry.params.clear_modified();
            }
        }
        self.clock = clock;

        let summary = TickSummary {
            clock,
            ran,
            skipped: self.nodes.len() - ran,
        };
        debug!(
            "Tick {}: {} ran, {} skipped, {} records live",
            clock,
            summary.ran,
            summary.skipped,
            self.arena.len()
        );
        Ok(summary)
    }

    /// Drop the aborted tick's allocations. The clock was never
    /// advanced, staged inputs are discarded, and parameter modified
    /// flags stay set so the caller can retry with changed inputs.
    fn rollback(&mut self, inserted: &[RecordId]) {
        for id in inserted {
            self.arena.remove(*id);
        }
    }
}
