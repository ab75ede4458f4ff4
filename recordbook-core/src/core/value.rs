//! Field value codec: raw stored JSON values to typed values and back.
//!
//! Stored data comes from several front-ends and is not trusted to match the
//! schema. [`decode`] never fails; it coerces whatever it finds into the shape
//! the property type expects. [`encode`] is driven by the typed value alone.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{PropertyDefinition, PropertyType};

/// The typed in-memory value of one property on one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum FieldValue {
    /// Text, date, status, select, formula and unknown kinds. Empty means unset.
    Text(String),
    /// Number and weight. `None` means unset or unparseable.
    Number(Option<f64>),
    Boolean(bool),
    /// Multiselect values.
    Set(BTreeSet<String>),
    /// Target record ID; the target may not exist.
    Relation(Option<String>),
    /// Buttons hold no value.
    Empty,
}

impl FieldValue {
    /// Formats the value for read-only display.
    pub fn display(&self, def: &PropertyDefinition) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(None) => String::new(),
            Self::Number(Some(n)) if def.property_type == PropertyType::Weight => format!("{n:.2}"),
            Self::Number(Some(n)) => format_number(*n),
            Self::Boolean(true) => "✓".to_string(),
            Self::Boolean(false) => String::new(),
            Self::Set(items) => items.iter().cloned().collect::<Vec<_>>().join(", "),
            Self::Relation(id) => id.clone().unwrap_or_default(),
            Self::Empty => String::new(),
        }
    }

    /// Whether the value counts as unset.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Number(n) => n.is_none(),
            Self::Boolean(_) => false,
            Self::Set(items) => items.is_empty(),
            Self::Relation(id) => id.is_none(),
            Self::Empty => true,
        }
    }
}

/// Decodes a raw stored value into the typed shape of `def`.
///
/// `None` means the record has no entry for the property.
pub fn decode(def: &PropertyDefinition, raw: Option<&Value>) -> FieldValue {
    match &def.property_type {
        PropertyType::Number | PropertyType::Weight => FieldValue::Number(raw.and_then(to_number)),
        PropertyType::Checkbox => FieldValue::Boolean(raw.is_some_and(is_truthy)),
        PropertyType::Multiselect => FieldValue::Set(to_set(raw)),
        PropertyType::Relation => FieldValue::Relation(raw.and_then(to_reference)),
        PropertyType::Button => FieldValue::Empty,
        PropertyType::Text
        | PropertyType::Select
        | PropertyType::Status
        | PropertyType::Date
        | PropertyType::Formula
        | PropertyType::Unknown(_) => FieldValue::Text(raw.map(to_text).unwrap_or_default()),
    }
}

/// Encodes a typed value into the raw form written to storage.
pub fn encode(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::Number(Some(n)) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(String::new())),
        FieldValue::Number(None) => Value::String(String::new()),
        FieldValue::Boolean(b) => Value::Bool(*b),
        FieldValue::Set(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
        FieldValue::Relation(Some(id)) => Value::String(id.clone()),
        FieldValue::Relation(None) => Value::String(String::new()),
        FieldValue::Empty => Value::Null,
    }
}

/// Normalizes a raw edit to the canonical stored form for `def`.
pub fn normalize(def: &PropertyDefinition, raw: &Value) -> Value {
    encode(&decode(def, Some(raw)))
}

fn to_text(raw: &Value) -> String {
    match raw {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        Value::Array(items) => items.iter().map(to_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => raw.to_string(),
    }
}

fn to_number(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn is_truthy(raw: &Value) -> bool {
    match raw {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        // Any non-empty string is set, including "false" and "0".
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn to_set(raw: Option<&Value>) -> BTreeSet<String> {
    match raw {
        None | Some(Value::Null) => BTreeSet::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(to_text)
            .filter(|s| !s.is_empty())
            .collect(),
        // Malformed single values become a one-element set.
        Some(scalar) => {
            let text = to_text(scalar);
            if text.is_empty() {
                BTreeSet::new()
            } else {
                BTreeSet::from([text])
            }
        }
    }
}

fn to_reference(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Formats a float without a trailing `.0` for whole numbers.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
