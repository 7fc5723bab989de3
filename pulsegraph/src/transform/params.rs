use std::collections::{HashMap, HashSet};

use crate::model::Value;

/// Per-node parameter bag with modification tracking.
///
/// `set` records which names changed; the scheduler clears the tracking
/// when a tick that ran the node commits. Transforms use [`modified`]
/// to decide whether a REFLOW pass is needed.
///
/// [`modified`]: Params::modified
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: HashMap<String, Value>,
    modified: HashSet<String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bag from initial values without marking them modified.
    pub fn with_values(values: HashMap<String, Value>) -> Self {
        Self {
            values,
            modified: HashSet::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.modified.insert(name.clone());
        self.values.insert(name, value);
    }

    /// True if any parameter changed since the last committed tick.
    pub fn modified(&self) -> bool {
        !self.modified.is_empty()
    }

    pub fn modified_param(&self, name: &str) -> bool {
        self.modified.contains(name)
    }

    pub(crate) fn clear_modified(&mut self) {
        self.modified.clear();
    }
}
