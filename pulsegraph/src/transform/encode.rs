//! Encode: applies caller-supplied encoding functions to records.
//!
//! The enter/update/exit split lets a caller express what happens when a
//! record first appears separately from what happens on every recompute
//! and on removal; named sets layer interaction states (hover, select)
//! on top. Entering records always run the baseline `update` before any
//! specialized set.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::error::EngineError;
use crate::model::Record;
use crate::pulse::{ChangeMask, Pulse};

use super::{Params, TickContext, Transform};

/// An encoding function plus the field paths it may write.
///
/// The apply closure returns whether the record's rendered state
/// actually changed. The output paths are carried as data so change
/// propagation never has to re-derive them per call.
pub struct Encoder {
    output: Vec<String>,
    apply: Box<dyn Fn(&mut Record, &Params) -> bool + Send + Sync>,
}

impl Encoder {
    pub fn new<F>(output: Vec<String>, apply: F) -> Self
    where
        F: Fn(&mut Record, &Params) -> bool + Send + Sync + 'static,
    {
        Self {
            output,
            apply: Box::new(apply),
        }
    }

    /// An encoder that writes nothing and reports no change.
    pub fn noop() -> Self {
        Self::new(Vec::new(), |_, _| false)
    }

    pub fn apply(&self, record: &mut Record, params: &Params) -> bool {
        (self.apply)(record, params)
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

/// The configured encoding sets for one Encode node.
///
/// Absent sets alias a single no-op instance created at build time. All
/// set comparisons are handle identity: two encoders with identical
/// behavior are distinct unless they are the same allocation.
#[derive(Debug, Clone)]
pub struct EncoderSet {
    update: Arc<Encoder>,
    enter: Arc<Encoder>,
    exit: Arc<Encoder>,
    named: HashMap<String, Arc<Encoder>>,
    noop: Arc<Encoder>,
}

impl EncoderSet {
    pub fn builder() -> EncoderSetBuilder {
        EncoderSetBuilder::default()
    }

    pub fn update(&self) -> Arc<Encoder> {
        Arc::clone(&self.update)
    }

    pub fn enter(&self) -> Arc<Encoder> {
        Arc::clone(&self.enter)
    }

    pub fn exit(&self) -> Arc<Encoder> {
        Arc::clone(&self.exit)
    }

    pub fn is_noop(&self, encoder: &Arc<Encoder>) -> bool {
        Arc::ptr_eq(encoder, &self.noop)
    }

    /// Resolve the active set for a tick: the named set when the pulse
    /// carries an encode tag and we are not re-entering, the default
    /// `update` otherwise. An unconfigured name resolves to the no-op,
    /// not to `update`.
    pub fn resolve(&self, encode: Option<&str>, reenter: bool) -> Arc<Encoder> {
        match encode {
            Some(name) if !reenter => match name {
                "update" => Arc::clone(&self.update),
                "exit" => Arc::clone(&self.exit),
                _ => match self.named.get(name) {
                    Some(encoder) => Arc::clone(encoder),
                    None => {
                        debug!("Encoding set '{}' not configured; using no-op", name);
                        Arc::clone(&self.noop)
                    }
                },
            },
            _ => Arc::clone(&self.update),
        }
    }
}

#[derive(Default)]
pub struct EncoderSetBuilder {
    update: Option<Encoder>,
    enter: Option<Encoder>,
    exit: Option<Encoder>,
    named: HashMap<String, Encoder>,
}

impl EncoderSetBuilder {
    pub fn update(mut self, encoder: Encoder) -> Self {
        self.update = Some(encoder);
        self
    }

    pub fn enter(mut self, encoder: Encoder) -> Self {
        self.enter = Some(encoder);
        self
    }

    pub fn exit(mut self, encoder: Encoder) -> Self {
        self.exit = Some(encoder);
        self
    }

    pub fn named(mut self, name: impl Into<String>, encoder: Encoder) -> Self {
        let name = name.into();
        match name.as_str() {
            "update" => self.update = Some(encoder),
            "enter" => self.enter = Some(encoder),
            "exit" => self.exit = Some(encoder),
            _ => {
                self.named.insert(name, encoder);
            }
        }
        self
    }

    pub fn build(self) -> EncoderSet {
        let noop = Arc::new(Encoder::noop());
        let slot = |e: Option<Encoder>, noop: &Arc<Encoder>| match e {
            Some(e) => Arc::new(e),
            None => Arc::clone(noop),
        };
        EncoderSet {
            update: slot(self.update, &noop),
            enter: slot(self.enter, &noop),
            exit: slot(self.exit, &noop),
            named: self
                .named
                .into_iter()
                .map(|(k, v)| (k, Arc::new(v)))
                .collect(),
            noop,
        }
    }
}

/// Invokes encoding functions for the records of each incoming pulse.
pub struct Encode {
    encoders: EncoderSet,
}

impl Encode {
    pub fn new(encoders: EncoderSet) -> Self {
        Self { encoders }
    }
}

impl Transform for Encode {
    fn name(&self) -> &str {
        "encode"
    }

    fn run(
        &mut self,
        params: &Params,
        pulse: &Pulse,
        ctx: &mut TickContext,
    ) -> Result<Pulse, EngineError> {
        let mut out = pulse.fork(ChangeMask::ADD_REM | ChangeMask::MOD);
        let reenter = pulse.encode() == Some("enter");
        let enc = &self.encoders;

        let update = enc.update();
        let enter = enc.enter();
        let exit = enc.exit();
        let set = enc.resolve(pulse.encode(), reenter);
        // Identity, not behavior: a named set that happens to equal
        // update must still run as an extra pass.
        let set_is_extra = !enc.is_noop(&set) && !Arc::ptr_eq(&set, &update);

        if pulse.changed(ChangeMask::ADD) {
            for id in pulse.ids(ChangeMask::ADD) {
                let record = ctx.arena.get_mut(id).ok_or_else(|| {
                    EngineError::transform(format!("Added record {} not in arena", id))
                })?;
                enter.apply(record, params);
                update.apply(record, params);
                if set_is_extra {
                    set.apply(record, params);
                }
            }
            out.modifies(enter.output().iter().cloned());
            out.modifies(update.output().iter().cloned());
            if set_is_extra {
                out.modifies(set.output().iter().cloned());
            }
        }

        if pulse.changed(ChangeMask::REM) && !enc.is_noop(&exit) {
            for id in pulse.ids(ChangeMask::REM) {
                let record = ctx.arena.get_mut(id).ok_or_else(|| {
                    EngineError::transform(format!("Removed record {} not in arena", id))
                })?;
                exit.apply(record, params);
            }
            out.modifies(exit.output().iter().cloned());
        }

        if reenter || !enc.is_noop(&set) {
            let flag = ChangeMask::MOD
                | if params.modified() {
                    ChangeMask::REFLOW
                } else {
                    ChangeMask::empty()
                };

            if reenter {
                for id in pulse.ids(flag) {
                    let record = ctx.arena.get_mut(id).ok_or_else(|| {
                        EngineError::transform(format!("Record {} not in arena", id))
                    })?;
                    let entered = enter.apply(record, params);
                    if set.apply(record, params) || entered {
                        out.push_mod(id);
                    }
                }
                if !out.modified().is_empty() {
                    out.modifies(enter.output().iter().cloned());
                }
            } else {
                for id in pulse.ids(flag) {
                    let record = ctx.arena.get_mut(id).ok_or_else(|| {
                        EngineError::transform(format!("Record {} not in arena", id))
                    })?;
                    if set.apply(record, params) {
                        out.push_mod(id);
                    }
                }
            }

            if !out.modified().is_empty() {
                out.modifies(set.output().iter().cloned());
            }
        }

        Ok(out)
    }
}
