//! Change-sets: the external input boundary for source nodes.

use std::collections::{HashMap, HashSet};

use crate::error::EngineError;
use crate::model::{RecordArena, RecordId, Value};

use super::Pulse;

/// Builder describing inserts, removes, and field modifications to feed
/// a source node at the next tick.
#[derive(Debug, Default)]
pub struct ChangeSet {
    inserts: Vec<HashMap<String, Value>>,
    removes: Vec<RecordId>,
    modifies: Vec<(RecordId, String, Value)>,
    encode: Option<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, fields: HashMap<String, Value>) -> Self {
        self.inserts.push(fields);
        self
    }

    pub fn remove(mut self, id: RecordId) -> Self {
        self.removes.push(id);
        self
    }

    pub fn modify(mut self, id: RecordId, field: impl Into<String>, value: Value) -> Self {
        self.modifies.push((id, field.into(), value));
        self
    }

    /// Select the named encoding set the downstream pipeline should run
    /// this tick. The literal `"enter"` re-enters currently-present
    /// records.
    pub fn encode(mut self, name: impl Into<String>) -> Self {
        self.encode = Some(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty()
            && self.removes.is_empty()
            && self.modifies.is_empty()
            && self.encode.is_none()
    }

    /// Materialize this change-set into `pulse` against the arena.
    ///
    /// Inserts allocate records stamped with the new clock. Removed
    /// records are recorded in `retired`; the scheduler drops them from
    /// the arena only when the tick commits.
    pub(crate) fn apply(
        self,
        arena: &mut RecordArena,
        pulse: &mut Pulse,
        clock: u64,
        inserted: &mut Vec<RecordId>,
        retired: &mut Vec<RecordId>,
    ) -> Result<(), EngineError> {
        for fields in self.inserts {
            let id = arena.insert(fields, clock);
            inserted.push(id);
            pulse.push_add(id);
        }

        for id in self.removes {
            if !arena.contains(id) {
                return Err(EngineError::invalid_argument(format!(
                    "Cannot remove unknown record {}",
                    id
                )));
            }
            pulse.push_rem(id);
            retired.push(id);
        }

        let mut already_mod: HashSet<RecordId> = pulse.modified().iter().copied().collect();
        for (id, field, value) in self.modifies {
            let record = arena.get_mut(id).ok_or_else(|| {
                EngineError::invalid_argument(format!("Cannot modify unknown record {}", id))
            })?;
            record.set(&field, value);
            record.mark(clock);
            if already_mod.insert(id) {
                pulse.push_mod(id);
            }
            pulse.modifies([field]);
        }

        if let Some(encode) = self.encode {
            pulse.set_encode(Some(encode));
        }

        Ok(())
    }
}
