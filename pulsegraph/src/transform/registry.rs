//! Transform registry for building pipelines from JSON descriptions.

use std::collections::HashMap;

use log::debug;

use crate::error::EngineError;
use crate::model::Value;

use super::{Collect, Derive, Encode, Encoder, EncoderSet, Transform};

type Constructor =
    Box<dyn Fn(&serde_json::Value) -> Result<Box<dyn Transform>, EngineError> + Send + Sync>;

/// Maps transform type names to constructors taking the node's `spec`
/// document.
pub struct TransformRegistry {
    constructors: HashMap<String, Constructor>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Create a registry with all built-in transforms registered.
    pub fn with_builtin_transforms() -> Self {
        let mut registry = Self::new();
        registry.register("collect", |_| Ok(Box::new(Collect::new())));
        registry.register("derive", |spec| {
            let derive = build_derive(spec)?;
            Ok(Box::new(derive))
        });
        registry.register("encode", |spec| {
            let encoders = compile_encoder_set(spec)?;
            Ok(Box::new(Encode::new(encoders)))
        });
        registry
    }

    pub fn register<F>(&mut self, type_id: impl Into<String>, constructor: F)
    where
        F: Fn(&serde_json::Value) -> Result<Box<dyn Transform>, EngineError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(type_id.into(), Box::new(constructor));
    }

    pub fn create(
        &self,
        type_id: &str,
        spec: &serde_json::Value,
    ) -> Result<Box<dyn Transform>, EngineError> {
        let constructor = self.constructors.get(type_id).ok_or_else(|| {
            EngineError::pipeline(format!("No transform registered for type: {}", type_id))
        })?;
        debug!("TransformRegistry: creating '{}' node", type_id);
        constructor(spec)
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.constructors.contains_key(type_id)
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtin_transforms()
    }
}

fn build_derive(spec: &serde_json::Value) -> Result<Derive, EngineError> {
    let obj = spec
        .as_object()
        .ok_or_else(|| EngineError::pipeline("derive spec must be an object"))?;
    let field = obj
        .get("field")
        .and_then(|v| v.as_str())
        .ok_or_else(|| EngineError::pipeline("derive spec requires a 'field' string"))?
        .to_string();
    let from = obj
        .get("from")
        .and_then(|v| v.as_str())
        .ok_or_else(|| EngineError::pipeline("derive spec requires a 'from' string"))?
        .to_string();
    Ok(Derive::new(field, move |record, _params| {
        record.get(&from).cloned().unwrap_or(Value::Null)
    }))
}

/// One field assignment in a declarative encoder spec.
enum EncodeRule {
    /// Write a constant value.
    Value(Value),
    /// Copy another field of the same record.
    Field(String),
}

/// Compile `{ "<set>": { "<field>": {"value": ..} | {"field": ..} } }`
/// into an [`EncoderSet`]. The compiled encoders report a change when
/// any target field's stored value actually changed.
pub fn compile_encoder_set(spec: &serde_json::Value) -> Result<EncoderSet, EngineError> {
    let obj = spec
        .as_object()
        .ok_or_else(|| EngineError::pipeline("encode spec must be an object"))?;

    let mut builder = EncoderSet::builder();
    for (set_name, rules) in obj {
        let encoder = compile_encoder(set_name, rules)?;
        builder = builder.named(set_name.clone(), encoder);
    }
    Ok(builder.build())
}

fn compile_encoder(set_name: &str, rules: &serde_json::Value) -> Result<Encoder, EngineError> {
    let obj = rules.as_object().ok_or_else(|| {
        EngineError::pipeline(format!("encode set '{}' must be an object", set_name))
    })?;

    let mut compiled: Vec<(String, EncodeRule)> = Vec::new();
    for (field, rule) in obj {
        let rule_obj = rule.as_object().ok_or_else(|| {
            EngineError::pipeline(format!(
                "encode rule for '{}.{}' must be an object",
                set_name, field
            ))
        })?;
        let rule = if let Some(value) = rule_obj.get("value") {
            EncodeRule::Value(Value::from(value.clone()))
        } else if let Some(source) = rule_obj.get("field").and_then(|v| v.as_str()) {
            EncodeRule::Field(source.to_string())
        } else {
            return Err(EngineError::pipeline(format!(
                "encode rule for '{}.{}' needs 'value' or 'field'",
                set_name, field
            )));
        };
        compiled.push((field.clone(), rule));
    }

    let output: Vec<String> = compiled.iter().map(|(field, _)| field.clone()).collect();
    Ok(Encoder::new(output, move |record, _params| {
        let mut changed = false;
        for (field, rule) in &compiled {
            let value = match rule {
                EncodeRule::Value(v) => v.clone(),
                EncodeRule::Field(source) => {
                    record.get(source).cloned().unwrap_or(Value::Null)
                }
            };
            changed |= record.set(field, value);
        }
        changed
    }))
}
