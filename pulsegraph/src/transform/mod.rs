//! The transform contract and the built-in transforms.

pub mod collect;
pub mod derive;
pub mod encode;
pub mod params;
pub mod registry;

pub use collect::Collect;
pub use derive::{Derive, FieldExpr};
pub use encode::{Encode, Encoder, EncoderSet, EncoderSetBuilder};
pub use params::Params;
pub use registry::TransformRegistry;

use crate::error::EngineError;
use crate::model::RecordArena;
use crate::pulse::Pulse;

/// Per-run handle granting arena access for the duration of one tick.
///
/// Record borrows taken through the context must not outlive the run
/// call; liveness across ticks is governed by pulse membership alone.
pub struct TickContext<'a> {
    pub arena: &'a mut RecordArena,
    pub clock: u64,
}

/// A dataflow graph node.
///
/// Given the node's current parameter values and an input pulse, produce
/// exactly one output pulse and perform any side effects on records.
/// Implementations must not mutate the input pulse's sequences, must
/// declare every field path they wrote via `modifies` on the output, and
/// must be safe to skip in a tick where their inputs did not change.
///
/// Returning an error aborts the current tick; the engine rolls back and
/// surfaces the error without retrying.
pub trait Transform: Send + Sync {
    /// Short type name, used for logging and registry dispatch.
    fn name(&self) -> &str;

    fn run(
        &mut self,
        params: &Params,
        pulse: &Pulse,
        ctx: &mut TickContext,
    ) -> Result<Pulse, EngineError>;
}
