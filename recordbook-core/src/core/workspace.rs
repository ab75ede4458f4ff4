//! Workspaces: named record collections sharing one property schema.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::evaluator::Evaluator;
use crate::lookup;
use crate::rules::{self, RuleMap};
use crate::{PropertyDefinition, Record};

/// ID of the workspace seeded into an empty store.
pub const DEFAULT_WORKSPACE_ID: &str = "ws-main";

/// A named collection of records and the schema that governs them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub name: String,
    /// Ordered property schema.
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
    /// Optional visibility rules; `None` shows every property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<RuleMap>,
}

impl Workspace {
    /// Creates a workspace with a generated `ws-<uuid>` ID.
    pub fn new(name: impl Into<String>, properties: Vec<PropertyDefinition>) -> Self {
        Self {
            id: format!("ws-{}", Uuid::new_v4()),
            name: name.into(),
            properties,
            rules: None,
        }
    }

    /// The workspace created when storage holds none.
    pub fn default_seed(name: impl Into<String>) -> Self {
        Self {
            id: DEFAULT_WORKSPACE_ID.to_string(),
            name: name.into(),
            properties: Vec::new(),
            rules: None,
        }
    }

    /// Finds a property by ID, falling back to its display name.
    pub fn property(&self, key: &str) -> Option<&PropertyDefinition> {
        self.properties
            .iter()
            .find(|p| p.key() == key)
            .or_else(|| self.properties.iter().find(|p| p.name == key))
    }

    /// Returns the rule map, creating an empty one on first use.
    pub fn rules_mut(&mut self) -> &mut RuleMap {
        self.rules.get_or_insert_with(RuleMap::new)
    }

    /// Copy of `record` whose schema values are reachable under both the
    /// property ID and the display name, so conditions may use either.
    ///
    /// Both keys carry the value [`lookup::lookup_for_definition`] resolves,
    /// replacing any stale entry, so conditions see what the field displays.
    pub fn with_name_aliases(&self, record: &Record) -> Record {
        let mut aliased = record.clone();
        for def in &self.properties {
            let Some(value) = lookup::lookup_for_definition(&record.properties, def) else {
                continue;
            };
            for key in [def.id.as_str(), def.name.as_str()] {
                if !key.is_empty() {
                    aliased.properties.insert(key.to_string(), value.clone());
                }
            }
        }
        aliased
    }

    /// Properties visible for `record` under this workspace's rules.
    ///
    /// Conditions see the record through [`with_name_aliases`](Self::with_name_aliases).
    pub fn visible_properties(&self, record: &Record, evaluator: &Evaluator) -> Vec<&PropertyDefinition> {
        if self.rules.is_none() {
            return self.properties.iter().collect();
        }
        let aliased = self.with_name_aliases(record);
        rules::filter_visible_with(evaluator, &self.properties, &aliased, self.rules.as_ref())
    }
}
