//! Key resolution over a record's property bag.
//!
//! Records written by different front-ends key their values inconsistently:
//! sometimes by property id, sometimes by display name, sometimes with
//! different casing. All reads go through this module so the resolution order
//! is the same everywhere:
//!
//! 1. exact property id
//! 2. exact property name
//! 3. case-insensitive property id
//! 4. case-insensitive property name
//!
//! Condition lookups only have a bare key and use steps 1 and 3.
//! Case-insensitive scans return the first match in map key order.

use serde_json::{Map, Value};

use crate::PropertyDefinition;

/// The raw property values of a record, keyed by property id or name.
pub type PropertyBag = Map<String, Value>;

/// Resolves `key` to a stored value: exact match first, then case-insensitive.
pub fn get_prop<'a>(properties: &'a PropertyBag, key: &str) -> Option<&'a Value> {
    resolve_key(properties, key).and_then(|k| properties.get(k))
}

/// Returns the stored key `key` resolves to, if any.
pub fn resolve_key<'a>(properties: &'a PropertyBag, key: &str) -> Option<&'a str> {
    if let Some((k, _)) = properties.get_key_value(key) {
        return Some(k.as_str());
    }
    let wanted = key.to_lowercase();
    properties
        .keys()
        .find(|k| k.to_lowercase() == wanted)
        .map(String::as_str)
}

/// Returns the stored key holding the value of `def`, following the documented order.
pub fn resolve_definition_key<'a>(
    properties: &'a PropertyBag,
    def: &PropertyDefinition,
) -> Option<&'a str> {
    let candidates = [def.id.as_str(), def.name.as_str()];
    let candidates = candidates.iter().filter(|c| !c.is_empty());

    for candidate in candidates.clone() {
        if let Some((k, _)) = properties.get_key_value(*candidate) {
            return Some(k.as_str());
        }
    }
    for candidate in candidates {
        let wanted = candidate.to_lowercase();
        if let Some(k) = properties.keys().find(|k| k.to_lowercase() == wanted) {
            return Some(k.as_str());
        }
    }
    None
}

/// Returns the stored value of `def`, following the documented order.
pub fn lookup_for_definition<'a>(
    properties: &'a PropertyBag,
    def: &PropertyDefinition,
) -> Option<&'a Value> {
    resolve_definition_key(properties, def).and_then(|k| properties.get(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PropertyType;
    use serde_json::json;

    fn bag(value: Value) -> PropertyBag {
        match value {
            Value::Object(map) => map,
            _ => panic!("test bag must be an object"),
        }
    }

    #[test]
    fn test_get_prop_prefers_exact_key() {
        let props = bag(json!({ "estado": "a", "Estado": "b" }));
        assert_eq!(get_prop(&props, "Estado"), Some(&json!("b")));
        assert_eq!(get_prop(&props, "estado"), Some(&json!("a")));
    }

    #[test]
    fn test_get_prop_falls_back_to_case_insensitive() {
        let props = bag(json!({ "estado": "Sí" }));
        assert_eq!(get_prop(&props, "ESTADO"), Some(&json!("Sí")));
        assert_eq!(get_prop(&props, "missing"), None);
    }

    #[test]
    fn test_definition_lookup_order() {
        let def = PropertyDefinition::new("p-tipo", "Tipo", PropertyType::Select);

        let by_id = bag(json!({ "p-tipo": "id", "Tipo": "name" }));
        assert_eq!(lookup_for_definition(&by_id, &def), Some(&json!("id")));

        let by_name = bag(json!({ "tipo": "ci-name", "Tipo": "name" }));
        assert_eq!(lookup_for_definition(&by_name, &def), Some(&json!("name")));

        let ci_id = bag(json!({ "P-TIPO": "ci-id", "tipo": "ci-name" }));
        assert_eq!(lookup_for_definition(&ci_id, &def), Some(&json!("ci-id")));

        let ci_name = bag(json!({ "TIPO": "ci-name" }));
        assert_eq!(resolve_definition_key(&ci_name, &def), Some("TIPO"));
    }

    #[test]
    fn test_definition_without_id_matches_by_name() {
        let def = PropertyDefinition::new("", "Nota", PropertyType::Text);
        let props = bag(json!({ "": "ignored", "Nota": "x" }));
        assert_eq!(lookup_for_definition(&props, &def), Some(&json!("x")));
    }
}
