//! Condition evaluation against a record's property values.
//!
//! Evaluation is fail-open: a malformed node, an unknown operator or nesting
//! beyond the configured depth resolves to `true`, so a broken rule shows a
//! property instead of hiding it. The depth cap is an approximation that
//! keeps cyclic or runaway rule data from recursing without bound; it is not
//! a correctness guarantee for deep trees.
//!
//! Comparisons follow loose scripting-language semantics so that values
//! stored as strings compare equal to numbers typed in the UI.

use serde_json::Value;

use crate::condition::{CompareOp, Condition};
use crate::lookup::{self, PropertyBag};
use crate::{Record, RecordbookError, Result};

/// Nesting depth beyond which a condition counts as satisfied.
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Evaluates [`Condition`] trees with a configurable depth cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluator {
    max_depth: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl Evaluator {
    /// Creates an evaluator. The root node is depth 0; a node deeper than
    /// `max_depth` evaluates to `true` without being inspected.
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Evaluates `condition` against `record`. `None` means no restriction.
    pub fn evaluate(&self, condition: Option<&Condition>, record: &Record) -> bool {
        self.evaluate_properties(condition, &record.properties)
    }

    /// Evaluates `condition` against a bare property bag.
    pub fn evaluate_properties(&self, condition: Option<&Condition>, properties: &PropertyBag) -> bool {
        self.eval_at(condition, properties, 0)
    }

    /// Evaluates untyped JSON input.
    ///
    /// `condition` may be `null` (no restriction). `record` must be an object
    /// whose `properties` member, when present and not null, is an object.
    ///
    /// # Errors
    ///
    /// Returns [`RecordbookError::InvalidArgument`] if `record` does not have
    /// that shape.
    pub fn evaluate_json(&self, condition: &Value, record: &Value) -> Result<bool> {
        let Value::Object(record) = record else {
            return Err(RecordbookError::InvalidArgument(format!(
                "record must be a JSON object, got {}",
                json_kind(record)
            )));
        };
        let empty = PropertyBag::new();
        let properties = match record.get("properties") {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(props)) => props,
            Some(other) => {
                return Err(RecordbookError::InvalidArgument(format!(
                    "record.properties must be a JSON object, got {}",
                    json_kind(other)
                )))
            }
        };
        let condition = (!condition.is_null()).then(|| Condition::from_json(condition));
        Ok(self.evaluate_properties(condition.as_ref(), properties))
    }

    fn eval_at(&self, condition: Option<&Condition>, props: &PropertyBag, depth: usize) -> bool {
        let Some(condition) = condition else {
            return true;
        };
        if depth > self.max_depth {
            log::debug!("condition nested deeper than {}; treating as satisfied", self.max_depth);
            return true;
        }

        match condition {
            Condition::And(items) => items
                .iter()
                .all(|c| self.eval_at(Some(c), props, depth + 1)),
            Condition::Or(items) => items
                .iter()
                .any(|c| self.eval_at(Some(c), props, depth + 1)),
            Condition::Not(inner) => !self.eval_at(inner.as_deref(), props, depth + 1),
            Condition::Compare { op, prop, value } => {
                let actual = prop.as_deref().and_then(|key| lookup::get_prop(props, key));
                compare(*op, actual, value.as_ref())
            }
            Condition::Unknown(raw) => {
                log::debug!("unrecognized condition {raw}; treating as satisfied");
                true
            }
        }
    }
}

/// Evaluates `condition` against `record` with the default depth cap.
pub fn evaluate(condition: Option<&Condition>, record: &Record) -> bool {
    Evaluator::default().evaluate(condition, record)
}

fn compare(op: CompareOp, actual: Option<&Value>, expected: Option<&Value>) -> bool {
    match op {
        CompareOp::Eq => loose_eq(actual, expected),
        CompareOp::Neq => !loose_eq(actual, expected),
        CompareOp::In => match expected {
            Some(Value::Array(items)) => contains(items, actual),
            _ => false,
        },
        CompareOp::Nin => match expected {
            Some(Value::Array(items)) => !contains(items, actual),
            _ => false,
        },
        CompareOp::Gt => to_number(actual) > to_number(expected),
        CompareOp::Lt => to_number(actual) < to_number(expected),
        CompareOp::Exists => match actual {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        },
    }
}

fn contains(items: &[Value], actual: Option<&Value>) -> bool {
    actual.is_some_and(|v| items.iter().any(|item| strict_eq(v, item)))
}

/// Loose equality. Absent and null only equal each other; numbers and numeric
/// strings compare by value; booleans act as 0/1; an array compared with a
/// scalar uses its comma-joined text. Two arrays or objects compare structurally.
pub(crate) fn loose_eq(a: Option<&Value>, b: Option<&Value>) -> bool {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => loose_eq_values(a, b),
        _ => false,
    }
}

fn loose_eq_values(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => strict_eq(a, b),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Bool(x), _) => loose_eq_values(&Value::from(u8::from(*x)), b),
        (_, Value::Bool(y)) => loose_eq_values(a, &Value::from(u8::from(*y))),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.as_f64() == Some(string_to_number(s))
        }
        (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => a == b,
        (Value::Array(_) | Value::Object(_), _) => {
            loose_eq_values(&Value::String(primitive_text(a)), b)
        }
        (_, Value::Array(_) | Value::Object(_)) => {
            loose_eq_values(a, &Value::String(primitive_text(b)))
        }
        _ => false,
    }
}

/// Equality without coercion; numbers compare by value regardless of representation.
pub(crate) fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Numeric coercion. Absent and non-numeric input become NaN, which makes
/// every ordering comparison false.
pub(crate) fn to_number(v: Option<&Value>) -> f64 {
    match v {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => string_to_number(s),
        Some(array @ Value::Array(_)) => string_to_number(&primitive_text(array)),
        Some(Value::Object(_)) => f64::NAN,
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let radix = match trimmed.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&trimmed[2..], radix)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Text form of a value when forced into a scalar comparison.
fn primitive_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n
            .as_f64()
            .map(crate::value::format_number)
            .unwrap_or_else(|| n.to_string()),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(primitive_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(props: Value) -> Record {
        let mut r = Record::new("ws", "r");
        if let Value::Object(map) = props {
            r.properties = map;
        }
        r
    }

    fn cond(raw: Value) -> Condition {
        Condition::from_json(&raw)
    }

    fn nested_nots(levels: usize, leaf: Condition) -> Condition {
        (0..levels).fold(leaf, |inner, _| Condition::not(inner))
    }

    #[test]
    fn test_absent_condition_is_satisfied() {
        assert!(evaluate(None, &record(json!({}))));
        assert!(evaluate(None, &record(json!({ "x": 1 }))));
    }

    #[test]
    fn test_empty_and_or() {
        let r = record(json!({}));
        assert!(evaluate(Some(&cond(json!({ "op": "and", "conditions": [] }))), &r));
        assert!(!evaluate(Some(&cond(json!({ "op": "or", "conditions": [] }))), &r));
    }

    #[test]
    fn test_eq_is_case_insensitive_on_keys() {
        let c = cond(json!({ "op": "eq", "prop": "Estado", "value": "Sí" }));
        assert!(evaluate(Some(&c), &record(json!({ "Estado": "Sí" }))));
        assert!(evaluate(Some(&c), &record(json!({ "estado": "Sí" }))));
        assert!(!evaluate(Some(&c), &record(json!({ "estado": "No" }))));
    }

    #[test]
    fn test_eq_is_loose() {
        let r = record(json!({ "n": "1", "b": true, "tags": ["A"], "none": null }));
        assert!(evaluate(Some(&cond(json!({ "op": "eq", "prop": "n", "value": 1 }))), &r));
        assert!(evaluate(Some(&cond(json!({ "op": "eq", "prop": "b", "value": 1 }))), &r));
        assert!(evaluate(Some(&cond(json!({ "op": "eq", "prop": "b", "value": "1" }))), &r));
        assert!(evaluate(Some(&cond(json!({ "op": "eq", "prop": "tags", "value": "A" }))), &r));
        assert!(evaluate(Some(&cond(json!({ "op": "eq", "prop": "none", "value": null }))), &r));
        assert!(evaluate(Some(&cond(json!({ "op": "eq", "prop": "missing" }))), &r));
        assert!(!evaluate(Some(&cond(json!({ "op": "eq", "prop": "none", "value": 0 }))), &r));
        assert!(evaluate(Some(&cond(json!({ "op": "neq", "prop": "n", "value": 2 }))), &r));
    }

    #[test]
    fn test_gt_lt_coerce_numeric_strings() {
        let c = cond(json!({ "op": "gt", "prop": "Edad", "value": 18 }));
        assert!(evaluate(Some(&c), &record(json!({ "Edad": "20" }))));
        assert!(!evaluate(Some(&c), &record(json!({ "Edad": "15" }))));
        assert!(!evaluate(Some(&c), &record(json!({ "Edad": "veinte" }))));
        assert!(!evaluate(Some(&c), &record(json!({}))));

        let lt = cond(json!({ "op": "lt", "prop": "Peso", "value": "2.5" }));
        assert!(evaluate(Some(&lt), &record(json!({ "Peso": 1.75 }))));
        assert!(evaluate(Some(&lt), &record(json!({ "Peso": "" }))));
    }

    #[test]
    fn test_in_and_nin_require_arrays() {
        let r = record(json!({ "Tipo": "Interno", "Nivel": 2 }));
        let in_list = cond(json!({ "op": "in", "prop": "Tipo", "value": ["Interno", "Mixto"] }));
        assert!(evaluate(Some(&in_list), &r));

        let nin_list = cond(json!({ "op": "nin", "prop": "Tipo", "value": ["Externo"] }));
        assert!(evaluate(Some(&nin_list), &r));

        let not_array = cond(json!({ "op": "in", "prop": "Tipo", "value": "Interno" }));
        assert!(!evaluate(Some(&not_array), &r));
        let nin_not_array = cond(json!({ "op": "nin", "prop": "Tipo", "value": "Externo" }));
        assert!(!evaluate(Some(&nin_not_array), &r));

        let strict = cond(json!({ "op": "in", "prop": "Nivel", "value": ["2"] }));
        assert!(!evaluate(Some(&strict), &r));
        let numeric = cond(json!({ "op": "in", "prop": "Nivel", "value": [2.0] }));
        assert!(evaluate(Some(&numeric), &r));

        let in_absent = cond(json!({ "op": "in", "prop": "Falta", "value": ["x"] }));
        assert!(!evaluate(Some(&in_absent), &r));
        let nin_absent = cond(json!({ "op": "nin", "prop": "Falta", "value": ["x"] }));
        assert!(evaluate(Some(&nin_absent), &r));
    }

    #[test]
    fn test_exists() {
        let c = cond(json!({ "op": "exists", "prop": "Nota" }));
        assert!(!evaluate(Some(&c), &record(json!({ "Nota": "" }))));
        assert!(evaluate(Some(&c), &record(json!({ "Nota": "x" }))));
        assert!(!evaluate(Some(&c), &record(json!({ "Nota": null }))));
        assert!(!evaluate(Some(&c), &record(json!({}))));
        assert!(evaluate(Some(&c), &record(json!({ "Nota": 0 }))));
    }

    #[test]
    fn test_unknown_operator_fails_open() {
        let c = cond(json!({ "op": "matches", "prop": "x", "value": "^a" }));
        assert!(evaluate(Some(&c), &record(json!({ "x": "zzz" }))));
    }

    #[test]
    fn test_not_without_child_is_false() {
        assert!(!evaluate(Some(&cond(json!({ "op": "not" }))), &record(json!({}))));
    }

    #[test]
    fn test_depth_cap_short_circuits_to_true() {
        let r = record(json!({ "x": "a" }));
        let always_true = Condition::eq("x", json!("a"));
        let always_false = Condition::eq("x", json!("b"));

        // Five `not` levels: the fifth sits past the cap and counts as satisfied.
        assert!(evaluate(Some(&nested_nots(5, always_true.clone())), &r));
        assert!(evaluate(Some(&nested_nots(5, always_false.clone())), &r));

        let deep = Evaluator::new(10);
        assert!(!deep.evaluate(Some(&nested_nots(5, always_true)), &r));
        assert!(deep.evaluate(Some(&nested_nots(5, always_false)), &r));
    }

    #[test]
    fn test_evaluate_json_rejects_non_object_records() {
        let ev = Evaluator::default();
        let c = json!({ "op": "exists", "prop": "x" });
        assert!(matches!(
            ev.evaluate_json(&c, &json!("not a record")),
            Err(RecordbookError::InvalidArgument(_))
        ));
        assert!(matches!(
            ev.evaluate_json(&c, &json!({ "properties": [1, 2] })),
            Err(RecordbookError::InvalidArgument(_))
        ));
        assert!(ev.evaluate_json(&c, &json!({ "properties": { "X": 1 } })).unwrap());
        assert!(ev.evaluate_json(&Value::Null, &json!({})).unwrap());
    }

    #[test]
    fn test_string_to_number_edge_cases() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number("0x1F"), 31.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("12abc").is_nan());
        assert_eq!(to_number(Some(&json!([]))), 0.0);
        assert_eq!(to_number(Some(&json!(["7"]))), 7.0);
        assert!(to_number(Some(&json!([1, 2]))).is_nan());
    }
}
