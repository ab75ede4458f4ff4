use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::lookup::{self, PropertyBag};
use crate::value::{self, FieldValue};
use crate::PropertyDefinition;

/// A single data item belonging to one workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default)]
    pub id: String,
    pub workspace_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub properties: PropertyBag,
}

impl Record {
    /// Creates an empty record with a freshly generated ID.
    pub fn new(workspace_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: generate_record_id(),
            workspace_id: workspace_id.into(),
            title: title.into(),
            properties: PropertyBag::new(),
        }
    }

    /// Assigns a generated ID when the record has none. Returns the ID.
    pub fn ensure_id(&mut self) -> &str {
        if self.id.is_empty() {
            self.id = generate_record_id();
        }
        &self.id
    }

    /// Looks up a raw value by bare key (exact, then case-insensitive).
    pub fn get_prop(&self, key: &str) -> Option<&Value> {
        lookup::get_prop(&self.properties, key)
    }

    /// Returns the raw value stored for `def`, or its declared default.
    pub fn raw_value<'a>(&'a self, def: &'a PropertyDefinition) -> Option<&'a Value> {
        lookup::lookup_for_definition(&self.properties, def).or(def.default_value.as_ref())
    }

    /// Returns the typed value of `def` on this record.
    pub fn field(&self, def: &PropertyDefinition) -> FieldValue {
        value::decode(def, self.raw_value(def))
    }

    /// Writes `raw` for `def` in canonical form under the definition key.
    ///
    /// A stale entry stored under the exact display name is removed so it
    /// cannot shadow the new value for name-based readers.
    pub fn set_field(&mut self, def: &PropertyDefinition, raw: &Value) {
        let key = def.key().to_string();
        if !def.name.is_empty() && def.name != key {
            self.properties.remove(&def.name);
        }
        self.properties.insert(key, value::normalize(def, raw));
    }

    /// Seeds every stored-value property that has a default and no value yet.
    pub fn apply_defaults(&mut self, properties: &[PropertyDefinition]) {
        for def in properties {
            if !def.property_type.is_editable() {
                continue;
            }
            if lookup::lookup_for_definition(&self.properties, def).is_some() {
                continue;
            }
            if let Some(default) = &def.default_value {
                self.properties
                    .insert(def.key().to_string(), value::normalize(def, default));
            }
        }
    }
}

/// Generates a record ID of the form `rec-<uuid>`.
pub fn generate_record_id() -> String {
    format!("rec-{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PropertyType;
    use serde_json::json;

    #[test]
    fn test_create_record() {
        let record = Record::new("ws-main", "Primera tarea");
        assert!(record.id.starts_with("rec-"));
        assert_eq!(record.workspace_id, "ws-main");
        assert!(record.properties.is_empty());
    }

    #[test]
    fn test_ensure_id_only_fills_blank() {
        let mut record: Record =
            serde_json::from_str(r#"{"workspaceId":"ws-main","title":"x"}"#).unwrap();
        assert!(record.id.is_empty());
        let id = record.ensure_id().to_string();
        assert!(id.starts_with("rec-"));
        assert_eq!(record.ensure_id(), id);
    }

    #[test]
    fn test_set_field_writes_canonical_value_under_id() {
        let def = PropertyDefinition::new("p-tags", "Etiquetas", PropertyType::Multiselect);
        let mut record = Record::new("ws", "r");
        record.properties.insert("Etiquetas".to_string(), json!("viejo"));

        record.set_field(&def, &json!(["b", "a", "b"]));

        assert_eq!(record.properties.get("p-tags"), Some(&json!(["a", "b"])));
        assert!(record.properties.get("Etiquetas").is_none());
    }

    #[test]
    fn test_field_falls_back_to_default() {
        let def = PropertyDefinition::new("done", "Hecho", PropertyType::Checkbox)
            .with_default(json!(true));
        let record = Record::new("ws", "r");
        assert_eq!(record.field(&def), FieldValue::Boolean(true));
    }

    #[test]
    fn test_apply_defaults_skips_existing_values_and_buttons() {
        let defs = vec![
            PropertyDefinition::new("estado", "Estado", PropertyType::Status)
                .with_default(json!("Pendiente")),
            PropertyDefinition::new("prio", "Prioridad", PropertyType::Number)
                .with_default(json!("3")),
            PropertyDefinition::new("go", "Go", PropertyType::Button).with_default(json!("x")),
        ];
        let mut record = Record::new("ws", "r");
        record.properties.insert("Prioridad".to_string(), json!(1));

        record.apply_defaults(&defs);

        assert_eq!(record.properties.get("estado"), Some(&json!("Pendiente")));
        assert_eq!(record.properties.get("Prioridad"), Some(&json!(1)));
        assert!(record.properties.get("prio").is_none());
        assert!(record.properties.get("go").is_none());
    }
}
