//! Internal domain modules for the Recordbook core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod condition;
pub mod error;
pub mod evaluator;
pub mod export;
pub mod formula;
pub mod lookup;
pub mod property;
pub mod record;
pub mod rules;
pub mod session;
pub mod settings;
pub mod storage;
pub mod value;
pub mod views;
pub mod workspace;

#[doc(inline)]
pub use condition::{CompareOp, Condition};
#[doc(inline)]
pub use error::{RecordbookError, Result};
#[doc(inline)]
pub use evaluator::{evaluate, Evaluator, DEFAULT_MAX_DEPTH};
#[doc(inline)]
pub use export::{import_into, read_archive, write_archive, ImportSummary};
#[doc(inline)]
pub use formula::FormulaEngine;
#[doc(inline)]
pub use property::{PropertyDefinition, PropertyType, RenderHint, DEFAULT_STATUS_OPTIONS};
#[doc(inline)]
pub use record::Record;
#[doc(inline)]
pub use rules::{apply_rules, filter_visible, filter_visible_with, Rule, RuleMap};
#[doc(inline)]
pub use session::{ButtonAction, ButtonContext, FieldView, RelationTarget, Session};
#[doc(inline)]
pub use settings::EngineSettings;
#[doc(inline)]
pub use storage::{ExportData, MemoryStorage, SqliteStorage, StorageAdapter};
#[doc(inline)]
pub use value::FieldValue;
#[doc(inline)]
pub use workspace::Workspace;
