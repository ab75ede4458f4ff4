//! Condition expression trees controlling property visibility.
//!
//! Conditions are stored as JSON:
//!
//! ```json
//! { "op": "and", "conditions": [
//!     { "op": "eq", "prop": "Aprobado", "value": "Sí" },
//!     { "op": "not", "condition": { "op": "exists", "prop": "Baja" } }
//! ] }
//! ```
//!
//! Parsing never fails. A node whose shape is not understood becomes
//! [`Condition::Unknown`], which the evaluator treats as satisfied.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A comparison between one record property and a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Neq,
    In,
    Nin,
    Gt,
    Lt,
    Exists,
}

impl CompareOp {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "eq" => Some(Self::Eq),
            "neq" => Some(Self::Neq),
            "in" => Some(Self::In),
            "nin" => Some(Self::Nin),
            "gt" => Some(Self::Gt),
            "lt" => Some(Self::Lt),
            "exists" => Some(Self::Exists),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::In => "in",
            Self::Nin => "nin",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Exists => "exists",
        }
    }
}

/// A boolean expression over a record's property values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Condition {
    /// True iff every child is true; empty is true.
    And(Vec<Condition>),
    /// True iff any child is true; empty is false.
    Or(Vec<Condition>),
    /// Negates the nested condition. A missing child counts as "no restriction".
    Not(Option<Box<Condition>>),
    Compare {
        op: CompareOp,
        /// Property key; `None` resolves to an absent value.
        prop: Option<String>,
        /// Literal operand; `None` when the node has no `value` key.
        value: Option<Value>,
    },
    /// Unrecognized operator or malformed node, kept verbatim.
    Unknown(Value),
}

impl Condition {
    pub fn compare(op: CompareOp, prop: impl Into<String>, value: Value) -> Self {
        Self::Compare {
            op,
            prop: Some(prop.into()),
            value: Some(value),
        }
    }

    pub fn eq(prop: impl Into<String>, value: Value) -> Self {
        Self::compare(CompareOp::Eq, prop, value)
    }

    pub fn exists(prop: impl Into<String>) -> Self {
        Self::Compare {
            op: CompareOp::Exists,
            prop: Some(prop.into()),
            value: None,
        }
    }

    pub fn not(inner: Condition) -> Self {
        Self::Not(Some(Box::new(inner)))
    }

    /// Parses a JSON node. Never fails; see [`Condition::Unknown`].
    pub fn from_json(node: &Value) -> Self {
        let Value::Object(map) = node else {
            return Self::Unknown(node.clone());
        };
        let Some(op) = map.get("op").and_then(Value::as_str) else {
            return Self::Unknown(node.clone());
        };

        match op.to_lowercase().as_str() {
            "and" => Self::And(children(map)),
            "or" => Self::Or(children(map)),
            "not" => Self::Not(
                map.get("condition")
                    .filter(|c| !c.is_null())
                    .map(|c| Box::new(Self::from_json(c))),
            ),
            other => match CompareOp::from_tag(other) {
                Some(op) => Self::Compare {
                    op,
                    prop: map.get("prop").and_then(prop_key),
                    value: map.get("value").cloned(),
                },
                None => Self::Unknown(node.clone()),
            },
        }
    }

    /// Serializes back to the stored JSON form.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        match self {
            Self::And(items) | Self::Or(items) => {
                let op = if matches!(self, Self::And(_)) { "and" } else { "or" };
                map.insert("op".into(), Value::from(op));
                map.insert(
                    "conditions".into(),
                    Value::Array(items.iter().map(Self::to_json).collect()),
                );
            }
            Self::Not(inner) => {
                map.insert("op".into(), Value::from("not"));
                if let Some(inner) = inner {
                    map.insert("condition".into(), inner.to_json());
                }
            }
            Self::Compare { op, prop, value } => {
                map.insert("op".into(), Value::from(op.tag()));
                if let Some(prop) = prop {
                    map.insert("prop".into(), Value::from(prop.as_str()));
                }
                if let Some(value) = value {
                    map.insert("value".into(), value.clone());
                }
            }
            Self::Unknown(raw) => return raw.clone(),
        }
        Value::Object(map)
    }
}

fn children(map: &Map<String, Value>) -> Vec<Condition> {
    match map.get("conditions") {
        Some(Value::Array(items)) => items.iter().map(Condition::from_json).collect(),
        _ => Vec::new(),
    }
}

fn prop_key(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl From<Value> for Condition {
    fn from(node: Value) -> Self {
        Self::from_json(&node)
    }
}

impl From<Condition> for Value {
    fn from(condition: Condition) -> Self {
        condition.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_condition() {
        let raw = json!({
            "op": "AND",
            "conditions": [
                { "op": "eq", "prop": "Aprobado", "value": "Sí" },
                { "op": "not", "condition": { "op": "exists", "prop": "Baja" } }
            ]
        });
        let parsed = Condition::from_json(&raw);
        assert_eq!(
            parsed,
            Condition::And(vec![
                Condition::eq("Aprobado", json!("Sí")),
                Condition::not(Condition::exists("Baja")),
            ])
        );
    }

    #[test]
    fn test_malformed_nodes_become_unknown() {
        assert!(matches!(Condition::from_json(&json!("eq")), Condition::Unknown(_)));
        assert!(matches!(Condition::from_json(&json!({ "prop": "x" })), Condition::Unknown(_)));
        assert!(matches!(
            Condition::from_json(&json!({ "op": "between", "prop": "x" })),
            Condition::Unknown(_)
        ));
    }

    #[test]
    fn test_and_without_conditions_is_empty() {
        assert_eq!(Condition::from_json(&json!({ "op": "and" })), Condition::And(vec![]));
        assert_eq!(
            Condition::from_json(&json!({ "op": "or", "conditions": "nope" })),
            Condition::Or(vec![])
        );
        assert_eq!(Condition::from_json(&json!({ "op": "not" })), Condition::Not(None));
    }

    #[test]
    fn test_serde_round_trip_keeps_unknown_nodes() {
        let raw = json!({
            "op": "or",
            "conditions": [
                { "op": "gt", "prop": "Edad", "value": 18 },
                { "op": "custom", "args": [1, 2] }
            ]
        });
        let parsed: Condition = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&parsed).unwrap(), raw);
    }

    #[test]
    fn test_numeric_prop_keys_are_stringified() {
        let parsed = Condition::from_json(&json!({ "op": "exists", "prop": 7 }));
        assert_eq!(
            parsed,
            Condition::Compare { op: CompareOp::Exists, prop: Some("7".to_string()), value: None }
        );
    }
}
