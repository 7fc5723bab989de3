//! Records and the arena that owns them.
//!
//! Pulses carry [`RecordId`]s, never records. Transforms borrow records
//! from the arena for the duration of one visit and must not retain
//! references across ticks: liveness is determined by pulse membership.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::value::Value;

/// Stable record identity. Allocated by the arena, never reused.
#[derive(
    Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug,
)]
pub struct RecordId(u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A mutable key/value record flowing through the graph.
#[derive(Debug, Clone)]
pub struct Record {
    id: RecordId,
    stamp: u64,
    fields: HashMap<String, Value>,
}

impl Record {
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// The tick clock at which a change-set last touched this record.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Write a field, returning whether the stored value actually changed.
    pub fn set(&mut self, field: &str, value: Value) -> bool {
        match self.fields.get(field) {
            Some(existing) if *existing == value => false,
            _ => {
                self.fields.insert(field.to_string(), value);
                true
            }
        }
    }

    pub fn fields(&self) -> &HashMap<String, Value> {
        &self.fields
    }

    pub(crate) fn mark(&mut self, clock: u64) {
        self.stamp = clock;
    }
}

/// Owns every live record, keyed by dense id.
///
/// Records removed by a tick's change-set stay resident until the tick
/// commits, since exit encoders still mutate them mid-tick.
#[derive(Debug, Default)]
pub struct RecordArena {
    records: HashMap<RecordId, Record>,
    next_id: u64,
}

impl RecordArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, fields: HashMap<String, Value>, clock: u64) -> RecordId {
        let id = RecordId(self.next_id);
        self.next_id += 1;
        self.records.insert(
            id,
            Record {
                id,
                stamp: clock,
                fields,
            },
        );
        id
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.records.get_mut(&id)
    }

    pub fn remove(&mut self, id: RecordId) -> Option<Record> {
        self.records.remove(&id)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.records.keys().copied()
    }
}
