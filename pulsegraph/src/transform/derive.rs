//! Derive: writes a computed field onto records as they flow through.

use std::sync::Arc;

use crate::error::EngineError;
use crate::model::{Record, Value};
use crate::pulse::{ChangeMask, Pulse};

use super::{Params, TickContext, Transform};

/// Expression evaluated per record to produce the derived value.
pub type FieldExpr = Arc<dyn Fn(&Record, &Params) -> Value + Send + Sync>;

/// Evaluates an expression for added and modified records (or the whole
/// source when the node's parameters changed) and stores the result in
/// a target field, declaring it on the output pulse.
pub struct Derive {
    field: String,
    expr: FieldExpr,
}

impl Derive {
    pub fn new<F>(field: impl Into<String>, expr: F) -> Self
    where
        F: Fn(&Record, &Params) -> Value + Send + Sync + 'static,
    {
        Self {
            field: field.into(),
            expr: Arc::new(expr),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl Transform for Derive {
    fn name(&self) -> &str {
        "derive"
    }

    fn run(
        &mut self,
        params: &Params,
        pulse: &Pulse,
        ctx: &mut TickContext,
    ) -> Result<Pulse, EngineError> {
        let mut out = pulse.fork(ChangeMask::ALL);
        pulse.visit(ChangeMask::MOD, |id| out.push_mod(id));
        out.modifies(pulse.modified_fields().iter().cloned());

        let flag = if params.modified() {
            ChangeMask::SOURCE
        } else {
            ChangeMask::ADD | ChangeMask::MOD
        };

        let ids = pulse.ids(flag);
        for id in &ids {
            let record = ctx.arena.get_mut(*id).ok_or_else(|| {
                EngineError::transform(format!("Record {} not in arena", id))
            })?;
            let value = (self.expr)(record, params);
            record.set(&self.field, value);
        }
        if !ids.is_empty() {
            out.modifies([self.field.clone()]);
        }

        Ok(out)
    }
}
