//! Rhai-backed evaluation of formula properties.
//!
//! A formula is a short Rhai script evaluated against one record. The
//! record's raw properties are visible as the object map `props` and its title
//! as `title`:
//!
//! ```text
//! props.precio * props.cantidad
//! if props.estado == "Completado" { "✓" } else { "" }
//! ```

use rhai::{Array, Dynamic, Engine, Map, Scope, FLOAT, INT};
use serde_json::Value;

use crate::value::format_number;
use crate::{Record, RecordbookError, Result};

/// Upper bound on Rhai operations per evaluation; stops runaway loops.
const MAX_OPERATIONS: u64 = 10_000;

/// Evaluates formula expressions.
#[derive(Debug)]
pub struct FormulaEngine {
    engine: Engine,
}

impl Default for FormulaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaEngine {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(MAX_OPERATIONS);
        engine.set_max_expr_depths(32, 32);
        Self { engine }
    }

    /// Evaluates `expression` for `record` and stringifies the result.
    ///
    /// Unit evaluates to `""`. Whole floats print without a fraction.
    ///
    /// # Errors
    ///
    /// Returns [`RecordbookError::Formula`] when the expression fails to
    /// parse or raises at runtime.
    pub fn evaluate(&self, expression: &str, record: &Record) -> Result<String> {
        let mut props = Map::new();
        for (key, value) in &record.properties {
            props.insert(key.as_str().into(), json_to_dynamic(value));
        }

        let mut scope = Scope::new();
        scope.push_constant("props", props);
        scope.push_constant("title", record.title.clone());

        let result = self
            .engine
            .eval_with_scope::<Dynamic>(&mut scope, expression)
            .map_err(|e| RecordbookError::Formula(e.to_string()))?;
        Ok(dynamic_to_display(result))
    }
}

/// Converts a stored JSON value into a Rhai [`Dynamic`].
///
/// `null` maps to `()`. Integral numbers become `INT`, the rest `FLOAT`.
pub(crate) fn json_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Dynamic::from(i as INT),
            None => Dynamic::from(n.as_f64().unwrap_or(FLOAT::NAN) as FLOAT),
        },
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(items) => Dynamic::from(items.iter().map(json_to_dynamic).collect::<Array>()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.as_str().into(), json_to_dynamic(v));
            }
            Dynamic::from(out)
        }
    }
}

fn dynamic_to_display(value: Dynamic) -> String {
    if value.is_unit() {
        return String::new();
    }
    if let Ok(f) = value.as_float() {
        return format_number(f);
    }
    value.to_string()
}
