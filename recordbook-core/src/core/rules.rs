//! Rule resolution: which properties a record shows.
//!
//! A [`RuleMap`] associates property IDs with named [`Rule`]s. Stored form:
//!
//! ```json
//! {
//!   "propX": ["r1", "r2"],
//!   "__defs": { "r1": { "id": "r1", "description": "...", "condition": { ... } } }
//! }
//! ```
//!
//! A property is visible iff every rule resolved for it evaluates true.
//! Properties without rules, rule IDs without definitions, and entries that
//! cannot be parsed are all ignored, so damaged rule data never hides a
//! property.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::condition::Condition;
use crate::evaluator::Evaluator;
use crate::{PropertyDefinition, Record};

/// Key under which rule definitions are stored inside a rule map.
pub const DEFS_KEY: &str = "__defs";

/// A named visibility condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl Rule {
    pub fn new(id: impl Into<String>, description: impl Into<String>, condition: Condition) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            condition: Some(condition),
        }
    }
}

/// Property-to-rule assignments plus the rule definitions they refer to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct RuleMap {
    assignments: BTreeMap<String, Vec<String>>,
    defs: BTreeMap<String, Rule>,
}

impl RuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty() && self.defs.is_empty()
    }

    /// Adds or replaces a rule definition.
    pub fn define(&mut self, rule: Rule) {
        self.defs.insert(rule.id.clone(), rule);
    }

    /// Attaches `rule_id` to `property_id`. Attaching twice is a no-op.
    pub fn assign(&mut self, property_id: impl Into<String>, rule_id: impl Into<String>) {
        let rule_id = rule_id.into();
        let ids = self.assignments.entry(property_id.into()).or_default();
        if !ids.contains(&rule_id) {
            ids.push(rule_id);
        }
    }

    /// Detaches `rule_id` from `property_id`, dropping the entry when it empties.
    pub fn unassign(&mut self, property_id: &str, rule_id: &str) {
        if let Some(ids) = self.assignments.get_mut(property_id) {
            ids.retain(|id| id != rule_id);
            if ids.is_empty() {
                self.assignments.remove(property_id);
            }
        }
    }

    /// Rule IDs attached to `property_id`, in stored order.
    pub fn rule_ids(&self, property_id: &str) -> &[String] {
        self.assignments
            .get(property_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn rule(&self, rule_id: &str) -> Option<&Rule> {
        self.defs.get(rule_id)
    }

    /// Rules attached to `property_id`, skipping IDs that have no definition.
    pub fn resolve(&self, property_id: &str) -> Vec<&Rule> {
        self.rule_ids(property_id)
            .iter()
            .filter_map(|id| {
                let rule = self.defs.get(id);
                if rule.is_none() {
                    log::debug!("rule '{id}' on property '{property_id}' has no definition; ignoring");
                }
                rule
            })
            .collect()
    }

    /// Parses the stored JSON form, skipping anything malformed.
    pub fn from_json(raw: &Value) -> Self {
        let mut map = Self::new();
        let Value::Object(entries) = raw else {
            return map;
        };

        for (key, entry) in entries {
            if key == DEFS_KEY {
                map.defs = parse_defs(entry);
                continue;
            }
            let ids: Vec<String> = match entry {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
                Value::String(single) => vec![single.clone()],
                _ => {
                    log::debug!("ignoring malformed rule list for property '{key}'");
                    continue;
                }
            };
            if !ids.is_empty() {
                map.assignments.insert(key.clone(), ids);
            }
        }
        map
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (property_id, ids) in &self.assignments {
            out.insert(property_id.clone(), Value::from(ids.clone()));
        }
        let defs: Map<String, Value> = self
            .defs
            .iter()
            .filter_map(|(id, rule)| serde_json::to_value(rule).ok().map(|v| (id.clone(), v)))
            .collect();
        out.insert(DEFS_KEY.to_string(), Value::Object(defs));
        Value::Object(out)
    }
}

fn parse_defs(raw: &Value) -> BTreeMap<String, Rule> {
    let Value::Object(entries) = raw else {
        return BTreeMap::new();
    };
    entries
        .iter()
        .filter_map(|(id, entry)| match serde_json::from_value::<Rule>(entry.clone()) {
            Ok(mut rule) => {
                if rule.id.is_empty() {
                    rule.id = id.clone();
                }
                Some((id.clone(), rule))
            }
            Err(e) => {
                log::debug!("ignoring malformed rule definition '{id}': {e}");
                None
            }
        })
        .collect()
}

impl From<Value> for RuleMap {
    fn from(raw: Value) -> Self {
        Self::from_json(&raw)
    }
}

impl From<RuleMap> for Value {
    fn from(map: RuleMap) -> Self {
        map.to_json()
    }
}

/// True iff every rule's condition holds for `record`. An empty list is true.
pub fn apply_rules(rules: &[&Rule], record: &Record, evaluator: &Evaluator) -> bool {
    rules
        .iter()
        .all(|rule| evaluator.evaluate(rule.condition.as_ref(), record))
}

/// Returns the properties visible for `record`, in their original order.
///
/// Without a rule map every property is visible.
pub fn filter_visible<'a>(
    properties: &'a [PropertyDefinition],
    record: &Record,
    rule_map: Option<&RuleMap>,
) -> Vec<&'a PropertyDefinition> {
    filter_visible_with(&Evaluator::default(), properties, record, rule_map)
}

/// [`filter_visible`] with an explicitly configured evaluator.
pub fn filter_visible_with<'a>(
    evaluator: &Evaluator,
    properties: &'a [PropertyDefinition],
    record: &Record,
    rule_map: Option<&RuleMap>,
) -> Vec<&'a PropertyDefinition> {
    let Some(rule_map) = rule_map else {
        return properties.iter().collect();
    };
    properties
        .iter()
        .filter(|prop| {
            if rule_map.rule_ids(prop.key()).is_empty() {
                return true;
            }
            apply_rules(&rule_map.resolve(prop.key()), record, evaluator)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PropertyType;
    use serde_json::json;

    fn record(props: Value) -> Record {
        let mut r = Record::new("ws", "r");
        if let Value::Object(map) = props {
            r.properties = map;
        }
        r
    }

    fn props(ids: &[&str]) -> Vec<PropertyDefinition> {
        ids.iter()
            .map(|id| PropertyDefinition::new(*id, *id, PropertyType::Text))
            .collect()
    }

    fn ids(visible: &[&PropertyDefinition]) -> Vec<String> {
        visible.iter().map(|p| p.id.clone()).collect()
    }

    #[test]
    fn test_rule_less_properties_are_visible() {
        let properties = props(&["a"]);
        let r = record(json!({}));
        assert_eq!(ids(&filter_visible(&properties, &r, Some(&RuleMap::new()))), vec!["a"]);
        assert_eq!(ids(&filter_visible(&properties, &r, None)), vec!["a"]);
    }

    #[test]
    fn test_end_to_end_hides_property_whose_rule_fails() {
        let rule_map: RuleMap = serde_json::from_value(json!({
            "propX": ["r1"],
            "__defs": {
                "r1": { "condition": { "op": "eq", "prop": "Tipo", "value": "Externo" } }
            }
        }))
        .unwrap();
        let properties = props(&["propX", "propY"]);

        let interno = record(json!({ "Tipo": "Interno" }));
        assert_eq!(ids(&filter_visible(&properties, &interno, Some(&rule_map))), vec!["propY"]);

        let externo = record(json!({ "Tipo": "Externo" }));
        assert_eq!(
            ids(&filter_visible(&properties, &externo, Some(&rule_map))),
            vec!["propX", "propY"]
        );
    }

    #[test]
    fn test_all_rules_must_pass() {
        let mut rule_map = RuleMap::new();
        rule_map.define(Rule::new("adult", "", Condition::from_json(&json!({ "op": "gt", "prop": "Edad", "value": 17 }))));
        rule_map.define(Rule::new("has-note", "", Condition::exists("Nota")));
        rule_map.assign("b", "adult");
        rule_map.assign("b", "has-note");

        let properties = props(&["a", "b", "c"]);
        let only_adult = record(json!({ "Edad": 30 }));
        assert_eq!(ids(&filter_visible(&properties, &only_adult, Some(&rule_map))), vec!["a", "c"]);

        let both = record(json!({ "Edad": 30, "Nota": "ok" }));
        assert_eq!(ids(&filter_visible(&properties, &both, Some(&rule_map))), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_definitions_are_dropped() {
        let rule_map = RuleMap::from_json(&json!({ "a": ["ghost"] }));
        let properties = props(&["a"]);
        assert_eq!(ids(&filter_visible(&properties, &record(json!({})), Some(&rule_map))), vec!["a"]);
    }

    #[test]
    fn test_order_is_preserved_and_never_duplicated() {
        let mut rule_map = RuleMap::new();
        rule_map.define(Rule::new("never", "", Condition::Or(vec![])));
        rule_map.assign("c", "never");
        rule_map.assign("c", "never");
        assert_eq!(rule_map.rule_ids("c").len(), 1);

        let properties = props(&["d", "c", "b", "a"]);
        let visible = filter_visible(&properties, &record(json!({})), Some(&rule_map));
        assert_eq!(ids(&visible), vec!["d", "b", "a"]);
    }

    #[test]
    fn test_malformed_entries_are_ignored() {
        let rule_map = RuleMap::from_json(&json!({
            "a": 42,
            "b": "r1",
            "__defs": { "r1": { "condition": { "op": "or", "conditions": [] } }, "bad": 7 }
        }));
        assert!(rule_map.rule_ids("a").is_empty());
        assert_eq!(rule_map.rule_ids("b"), ["r1".to_string()]);
        assert_eq!(rule_map.rule("r1").map(|r| r.id.as_str()), Some("r1"));
        assert!(rule_map.rule("bad").is_none());
    }

    #[test]
    fn test_unassign_drops_empty_entries() {
        let mut rule_map = RuleMap::new();
        rule_map.assign("a", "r1");
        rule_map.unassign("a", "r1");
        assert!(rule_map.is_empty());
    }

    #[test]
    fn test_rule_map_serializes_with_defs_key() {
        let mut rule_map = RuleMap::new();
        rule_map.define(Rule::new("r1", "Mostrar si aprobado", Condition::eq("Aprobado", json!("Sí"))));
        rule_map.assign("propX", "r1");

        let json = serde_json::to_value(&rule_map).unwrap();
        assert_eq!(json["propX"], json!(["r1"]));
        assert_eq!(json["__defs"]["r1"]["condition"]["op"], "eq");

        let back: RuleMap = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule_map);
    }
}
