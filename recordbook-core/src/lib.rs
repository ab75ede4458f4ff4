//! Core library for Recordbook — a local-first workspace of typed records with
//! rule-driven property visibility.
//!
//! The primary entry point is [`Session`], which owns a [`StorageAdapter`] and
//! the currently open [`Workspace`]. The pure pieces (field codec, condition
//! evaluator, rule resolution) are usable on their own:
//!
//! ```
//! use recordbook_core::{filter_visible, Condition, PropertyDefinition, PropertyType, Record, Rule, RuleMap};
//! use serde_json::json;
//!
//! let props = vec![
//!     PropertyDefinition::new("tipo", "Tipo", PropertyType::Select),
//!     PropertyDefinition::new("empresa", "Empresa", PropertyType::Text),
//! ];
//! let mut rules = RuleMap::new();
//! rules.define(Rule::new("externo", "", Condition::eq("tipo", json!("Externo"))));
//! rules.assign("empresa", "externo");
//!
//! let mut record = Record::new("ws-main", "Ana");
//! record.properties.insert("tipo".into(), json!("Interno"));
//! assert_eq!(filter_visible(&props, &record, Some(&rules)).len(), 1);
//! ```
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

pub use core::{
    condition, evaluator, export, formula, lookup, property, record, rules, session, settings,
    storage, value, views, workspace,
};

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    condition::{CompareOp, Condition},
    error::{RecordbookError, Result},
    evaluator::{evaluate, Evaluator, DEFAULT_MAX_DEPTH},
    export::{import_into, read_archive, write_archive, ImportSummary},
    formula::FormulaEngine,
    lookup::PropertyBag,
    property::{PropertyDefinition, PropertyType, RenderHint, DEFAULT_STATUS_OPTIONS},
    record::Record,
    rules::{apply_rules, filter_visible, filter_visible_with, Rule, RuleMap},
    session::{ButtonAction, ButtonContext, FieldView, RelationTarget, Session},
    settings::EngineSettings,
    storage::{ExportData, MemoryStorage, SqliteStorage, StorageAdapter},
    value::FieldValue,
    views::{AgendaEntry, BoardColumn},
    workspace::Workspace,
};
