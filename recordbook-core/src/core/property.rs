//! Property type registry: the closed set of property kinds and their definitions.
//!
//! A [`PropertyDefinition`] is one column of a workspace schema. Its
//! [`PropertyType`] fixes the shape of the stored value (see
//! [`crate::value`]) and the widget the rendering layer should build for it
//! (see [`RenderHint`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status columns used when a status property declares no options of its own.
pub const DEFAULT_STATUS_OPTIONS: [&str; 3] = ["Pendiente", "En Progreso", "Completado"];

/// The kind of a property.
///
/// Serialized as a lowercase tag (`"text"`, `"multiselect"`, …). Tags this
/// version does not know deserialize to [`PropertyType::Unknown`], which keeps
/// the original tag and behaves like [`PropertyType::Text`] everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PropertyType {
    #[default]
    Text,
    Number,
    /// Non-negative number shown with two decimals.
    Weight,
    Select,
    Multiselect,
    Checkbox,
    /// ISO-8601 date string; empty means unset.
    Date,
    Status,
    /// ID of a record in the same or another workspace.
    Relation,
    /// Runs a registered action; stores nothing.
    Button,
    /// Computed, read-only display string.
    Formula,
    /// A tag from a newer schema, treated as text.
    Unknown(String),
}

impl PropertyType {
    /// Parses a type tag. Matching is case-insensitive; unknown tags are preserved.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "text" => Self::Text,
            "number" => Self::Number,
            "weight" => Self::Weight,
            "select" => Self::Select,
            "multiselect" => Self::Multiselect,
            "checkbox" => Self::Checkbox,
            "date" => Self::Date,
            "status" => Self::Status,
            "relation" => Self::Relation,
            "button" => Self::Button,
            "formula" => Self::Formula,
            _ => Self::Unknown(tag.to_string()),
        }
    }

    /// Returns the tag this type is stored under.
    pub fn tag(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Weight => "weight",
            Self::Select => "select",
            Self::Multiselect => "multiselect",
            Self::Checkbox => "checkbox",
            Self::Date => "date",
            Self::Status => "status",
            Self::Relation => "relation",
            Self::Button => "button",
            Self::Formula => "formula",
            Self::Unknown(tag) => tag,
        }
    }

    /// Whether users can type a value into this property.
    pub fn is_editable(&self) -> bool {
        !matches!(self, Self::Button | Self::Formula)
    }

    /// Whether values of this kind are drawn from the definition's `options`.
    pub fn uses_options(&self) -> bool {
        matches!(self, Self::Select | Self::Multiselect | Self::Status)
    }
}

impl From<String> for PropertyType {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<PropertyType> for String {
    fn from(kind: PropertyType) -> Self {
        kind.tag().to_string()
    }
}

/// Describes a single typed property within a workspace schema.
///
/// `id` is the stable storage key; `name` is a label that may be renamed
/// freely. Definitions written by older drafts may lack an `id`, in which
/// case [`key`](Self::key) falls back to the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub property_type: PropertyType,
    /// Allowed values for select, multiselect and status properties.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Target workspace for relation properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_workspace: Option<String>,
    /// Name of the registered action a button property runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Raw value used when a record carries no value for this property.
    #[serde(rename = "default", default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Rhai expression computed for formula properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    /// Caption for button properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl PropertyDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            property_type,
            options: Vec::new(),
            relation_workspace: None,
            action: None,
            default_value: None,
            formula: None,
            label: None,
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_relation(mut self, workspace_id: impl Into<String>) -> Self {
        self.relation_workspace = Some(workspace_id.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_formula(mut self, expression: impl Into<String>) -> Self {
        self.formula = Some(expression.into());
        self
    }

    /// The key values of this property are written under: `id`, or `name` when `id` is empty.
    pub fn key(&self) -> &str {
        if self.id.is_empty() {
            &self.name
        } else {
            &self.id
        }
    }

    /// Options offered to the user. Status properties without options get `status_defaults`.
    pub fn effective_options(&self, status_defaults: &[String]) -> Vec<String> {
        if self.property_type == PropertyType::Status && self.options.is_empty() {
            status_defaults.to_vec()
        } else {
            self.options.clone()
        }
    }

    /// Returns the widget the rendering layer should build for this property.
    pub fn render_hint(&self, status_defaults: &[String]) -> RenderHint {
        match &self.property_type {
            PropertyType::Text | PropertyType::Unknown(_) => RenderHint::TextInput,
            PropertyType::Number => RenderHint::NumberInput { step: None, min: None },
            PropertyType::Weight => RenderHint::NumberInput {
                step: Some(0.01),
                min: Some(0.0),
            },
            PropertyType::Select | PropertyType::Status => RenderHint::Select {
                options: self.effective_options(status_defaults),
            },
            PropertyType::Multiselect => RenderHint::MultiSelect {
                options: self.options.clone(),
            },
            PropertyType::Checkbox => RenderHint::Checkbox,
            PropertyType::Date => RenderHint::DateInput,
            PropertyType::Relation => RenderHint::RelationPicker {
                workspace: self.relation_workspace.clone(),
            },
            PropertyType::Button => RenderHint::Button {
                label: self
                    .label
                    .clone()
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| self.name.clone()),
            },
            PropertyType::Formula => RenderHint::FormulaView,
        }
    }
}

/// The widget contract handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "camelCase")]
pub enum RenderHint {
    TextInput,
    NumberInput { step: Option<f64>, min: Option<f64> },
    DateInput,
    Select { options: Vec<String> },
    MultiSelect { options: Vec<String> },
    Checkbox,
    /// Picker over the records of `workspace`; `None` means the target is not configured.
    RelationPicker { workspace: Option<String> },
    Button { label: String },
    FormulaView,
}
