//! Pulses: the per-tick change descriptors flowing between transforms.

pub mod changeset;

pub use changeset::ChangeSet;

use std::collections::HashSet;

use crate::model::RecordId;

bitflags::bitflags! {
    /// Change-type mask for [`Pulse`] queries, visits, and fork
    /// capabilities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChangeMask: u8 {
        /// Records newly visible this tick.
        const ADD = 0x01;
        /// Records removed this tick.
        const REM = 0x02;
        /// Records whose fields changed without a membership change.
        const MOD = 0x04;
        /// Visit modifier: treat every currently-visible record as
        /// modified. Used when an upstream parameter changed and all
        /// records must be recomputed.
        const REFLOW = 0x08;
        /// Visit modifier: walk the materialized source sequence only.
        const SOURCE = 0x10;

        const ADD_REM = 0x03;
        const ADD_MOD = 0x05;
        const ALL = 0x07;
    }
}

/// The change-set for one propagation tick.
///
/// A pulse's add/rem/mod sequences, once finalized by the transform that
/// produced it, are not mutated further; downstream deltas are expressed
/// through new forks.
#[derive(Debug, Clone)]
pub struct Pulse {
    clock: u64,
    add: Vec<RecordId>,
    rem: Vec<RecordId>,
    mods: Vec<RecordId>,
    changed: ChangeMask,
    caps: ChangeMask,
    encode: Option<String>,
    source: Option<Vec<RecordId>>,
    modified_fields: HashSet<String>,
}

impl Pulse {
    /// Root pulse for a tick, permitted to carry every change type.
    pub fn new(clock: u64) -> Self {
        Self {
            clock,
            add: Vec::new(),
            rem: Vec::new(),
            mods: Vec::new(),
            changed: ChangeMask::empty(),
            caps: ChangeMask::ALL,
            encode: None,
            source: None,
            modified_fields: HashSet::new(),
        }
    }

    /// Derive a new pulse for the same tick, restricted to the change
    /// types named in `caps`.
    ///
    /// ADD and REM grants relay the parent's membership sequences. A MOD
    /// grant always starts empty: modified records are a claim the
    /// forking transform computes itself, never inherited. The fork
    /// keeps the parent's clock, encode tag, and source, and starts with
    /// no declared field paths.
    pub fn fork(&self, caps: ChangeMask) -> Pulse {
        let caps = caps & ChangeMask::ALL;
        let add = if caps.contains(ChangeMask::ADD) {
            self.add.clone()
        } else {
            Vec::new()
        };
        let rem = if caps.contains(ChangeMask::REM) {
            self.rem.clone()
        } else {
            Vec::new()
        };
        let mut changed = ChangeMask::empty();
        if !add.is_empty() {
            changed |= ChangeMask::ADD;
        }
        if !rem.is_empty() {
            changed |= ChangeMask::REM;
        }
        // Relay forced-change bits for relayed sequences.
        changed |= self.changed & caps & ChangeMask::ADD_REM;
        Pulse {
            clock: self.clock,
            add,
            rem,
            mods: Vec::new(),
            changed,
            caps,
            encode: self.encode.clone(),
            source: self.source.clone(),
            modified_fields: HashSet::new(),
        }
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn added(&self) -> &[RecordId] {
        &self.add
    }

    pub fn removed(&self) -> &[RecordId] {
        &self.rem
    }

    pub fn modified(&self) -> &[RecordId] {
        &self.mods
    }

    pub fn encode(&self) -> Option<&str> {
        self.encode.as_deref()
    }

    pub fn set_encode(&mut self, encode: Option<String>) {
        self.encode = encode;
    }

    pub fn source(&self) -> Option<&[RecordId]> {
        self.source.as_deref()
    }

    pub fn set_source(&mut self, source: Vec<RecordId>) {
        self.source = Some(source);
    }

    /// True if any of the requested change types are non-empty or forced
    /// for this pulse.
    pub fn changed(&self, mask: ChangeMask) -> bool {
        !(self.changed & mask & ChangeMask::ALL).is_empty()
    }

    /// Force change bits on even while the matching sequence is empty.
    pub fn set_changed(&mut self, mask: ChangeMask) {
        let mask = mask & ChangeMask::ALL;
        assert!(
            self.caps.contains(mask),
            "pulse may not claim {:?} changes (capability mask {:?})",
            mask,
            self.caps
        );
        self.changed |= mask;
    }

    pub fn push_add(&mut self, id: RecordId) {
        assert!(
            self.caps.contains(ChangeMask::ADD),
            "pulse may not carry ADD records (capability mask {:?})",
            self.caps
        );
        self.add.push(id);
        self.changed |= ChangeMask::ADD;
    }

    pub fn push_rem(&mut self, id: RecordId) {
        assert!(
            self.caps.contains(ChangeMask::REM),
            "pulse may not carry REM records (capability mask {:?})",
            self.caps
        );
        self.rem.push(id);
        self.changed |= ChangeMask::REM;
    }

    pub fn push_mod(&mut self, id: RecordId) {
        assert!(
            self.caps.contains(ChangeMask::MOD),
            "pulse may not carry MOD records (capability mask {:?})",
            self.caps
        );
        self.mods.push(id);
        self.changed |= ChangeMask::MOD;
    }

    /// Declare field paths that consumers should treat as changed this
    /// tick. Idempotent; accumulates.
    pub fn modifies<S: Into<String>>(&mut self, paths: impl IntoIterator<Item = S>) {
        for path in paths {
            self.modified_fields.insert(path.into());
        }
    }

    pub fn modified_fields(&self) -> &HashSet<String> {
        &self.modified_fields
    }

    pub fn is_modified(&self, path: &str) -> bool {
        self.modified_fields.contains(path)
    }

    /// Whether downstream nodes have anything to react to.
    pub fn propagates(&self) -> bool {
        !(self.changed & ChangeMask::ALL).is_empty() || !self.modified_fields.is_empty()
    }

    /// Apply `f` to every record id in the requested sequences, in
    /// insertion order, without mutating them.
    ///
    /// `SOURCE` walks the materialized source sequence and nothing else.
    /// `REFLOW` additionally walks every source record not already in
    /// add or mod, so each record is visited at most once per call.
    pub fn visit<F: FnMut(RecordId)>(&self, mask: ChangeMask, mut f: F) {
        if mask.contains(ChangeMask::SOURCE) {
            if let Some(source) = &self.source {
                for id in source {
                    f(*id);
                }
            }
            return;
        }

        if mask.contains(ChangeMask::ADD) {
            for id in &self.add {
                f(*id);
            }
        }
        if mask.contains(ChangeMask::REM) {
            for id in &self.rem {
                f(*id);
            }
        }
        if mask.contains(ChangeMask::MOD) {
            for id in &self.mods {
                f(*id);
            }
        }

        if mask.contains(ChangeMask::REFLOW) {
            if let Some(source) = &self.source {
                if self.add.is_empty() && self.mods.is_empty() {
                    for id in source {
                        f(*id);
                    }
                } else {
                    let seen: HashSet<RecordId> =
                        self.add.iter().chain(self.mods.iter()).copied().collect();
                    for id in source {
                        if !seen.contains(id) {
                            f(*id);
                        }
                    }
                }
            }
        }
    }

    /// Visit order collected into a vector, for fallible per-record work.
    pub fn ids(&self, mask: ChangeMask) -> Vec<RecordId> {
        let mut ids = Vec::new();
        self.visit(mask, |id| ids.push(id));
        ids
    }

    /// Engine-internal fold of another pulse into this one, used when a
    /// node has several upstream edges. Bypasses capability checks; the
    /// target is always an engine-owned full-capability pulse.
    pub(crate) fn absorb(&mut self, other: &Pulse) {
        self.add.extend_from_slice(&other.add);
        self.rem.extend_from_slice(&other.rem);
        self.mods.extend_from_slice(&other.mods);
        self.changed |= other.changed & ChangeMask::ALL;
        for path in &other.modified_fields {
            self.modified_fields.insert(path.clone());
        }
        if other.source.is_some() {
            self.source = other.source.clone();
        }
        if other.encode.is_some() {
            self.encode = other.encode.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordArena;
    use std::collections::HashMap;

    fn ids(arena: &mut RecordArena, n: usize) -> Vec<RecordId> {
        (0..n).map(|_| arena.insert(HashMap::new(), 1)).collect()
    }

    #[test]
    fn test_changed_tracks_pushes_and_forcing() {
        let mut arena = RecordArena::new();
        let r = ids(&mut arena, 1);
        let mut pulse = Pulse::new(1);
        assert!(!pulse.changed(ChangeMask::ALL));

        pulse.push_add(r[0]);
        assert!(pulse.changed(ChangeMask::ADD));
        assert!(!pulse.changed(ChangeMask::REM | ChangeMask::MOD));

        pulse.set_changed(ChangeMask::MOD);
        assert!(pulse.changed(ChangeMask::MOD));
        assert!(pulse.modified().is_empty());
    }

    #[test]
    fn test_fork_relays_add_rem_but_not_mod() {
        let mut arena = RecordArena::new();
        let r = ids(&mut arena, 3);
        let mut pulse = Pulse::new(2);
        pulse.push_add(r[0]);
        pulse.push_rem(r[1]);
        pulse.push_mod(r[2]);

        let fork = pulse.fork(ChangeMask::ALL);
        assert_eq!(fork.added(), &[r[0]]);
        assert_eq!(fork.removed(), &[r[1]]);
        assert!(fork.modified().is_empty());
        assert!(!fork.changed(ChangeMask::MOD));
        assert!(fork.modified_fields().is_empty());
    }

    #[test]
    fn test_fork_without_grant_starts_empty() {
        let mut arena = RecordArena::new();
        let r = ids(&mut arena, 2);
        let mut pulse = Pulse::new(2);
        pulse.push_add(r[0]);
        pulse.push_rem(r[1]);

        let fork = pulse.fork(ChangeMask::REM);
        assert!(fork.added().is_empty());
        assert_eq!(fork.removed(), &[r[1]]);
    }

    #[test]
    #[should_panic(expected = "may not carry ADD")]
    fn test_fork_capability_violation_panics() {
        let pulse = Pulse::new(1);
        let mut fork = pulse.fork(ChangeMask::MOD);
        let mut arena = RecordArena::new();
        let id = arena.insert(HashMap::new(), 1);
        fork.push_add(id);
    }

    #[test]
    fn test_visit_order_matches_insertion() {
        let mut arena = RecordArena::new();
        let r = ids(&mut arena, 3);
        let mut pulse = Pulse::new(1);
        pulse.push_add(r[2]);
        pulse.push_add(r[0]);
        pulse.push_add(r[1]);

        let visited = pulse.ids(ChangeMask::ADD);
        assert_eq!(visited, vec![r[2], r[0], r[1]]);
    }

    #[test]
    fn test_reflow_visits_source_minus_add_and_mod() {
        let mut arena = RecordArena::new();
        let r = ids(&mut arena, 4);
        let mut pulse = Pulse::new(1);
        pulse.push_add(r[0]);
        pulse.push_mod(r[1]);
        pulse.set_source(vec![r[0], r[1], r[2], r[3]]);

        let visited = pulse.ids(ChangeMask::MOD | ChangeMask::REFLOW);
        assert_eq!(visited, vec![r[1], r[2], r[3]]);
    }

    #[test]
    fn test_reflow_with_no_changes_visits_whole_source() {
        let mut arena = RecordArena::new();
        let r = ids(&mut arena, 3);
        let mut pulse = Pulse::new(1);
        pulse.set_source(vec![r[0], r[1], r[2]]);

        let visited = pulse.ids(ChangeMask::MOD | ChangeMask::REFLOW);
        assert_eq!(visited, vec![r[0], r[1], r[2]]);
    }

    #[test]
    fn test_modifies_is_idempotent() {
        let mut pulse = Pulse::new(1);
        pulse.modifies(["x", "y"]);
        pulse.modifies(["x"]);
        assert_eq!(pulse.modified_fields().len(), 2);
        assert!(pulse.is_modified("x"));
        assert!(pulse.is_modified("y"));
        assert!(!pulse.is_modified("z"));
    }
}
