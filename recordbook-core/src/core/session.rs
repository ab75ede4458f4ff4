//! The application context: one storage adapter, the active workspace and
//! its loaded records.
//!
//! [`Session`] is the single owner of in-memory state. Every write goes to
//! storage first; the in-memory copy changes only after the adapter
//! succeeds, so a failed write never leaves memory ahead of storage.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::evaluator::Evaluator;
use crate::export::{self, ImportSummary};
use crate::formula::FormulaEngine;
use crate::lookup::PropertyBag;
use crate::property::RenderHint;
use crate::settings::EngineSettings;
use crate::storage::{ExportData, StorageAdapter};
use crate::value::FieldValue;
use crate::views::{self, AgendaEntry, BoardColumn};
use crate::{PropertyDefinition, PropertyType, Record, RecordbookError, Result, Workspace};

/// Everything a button action may read.
pub struct ButtonContext<'a> {
    pub record: &'a Record,
    /// The button property itself.
    pub property: &'a PropertyDefinition,
    /// Raw value stored under the button's key, if any.
    pub value: Option<&'a Value>,
    pub workspace: &'a Workspace,
}

/// A registered button handler.
///
/// Returning `Some(updates)` writes each `key → raw value` pair to the
/// pressed record, keys resolved like [`Workspace::property`].
pub type ButtonAction = Box<dyn Fn(&ButtonContext<'_>) -> Option<PropertyBag>>;

/// Everything the rendering layer needs to draw one property of one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub property: PropertyDefinition,
    pub hint: RenderHint,
    pub value: FieldValue,
    pub display: String,
    pub editable: bool,
}

/// Outcome of following a relation property.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationTarget {
    Resolved { workspace_id: String, record: Record },
    /// The stored ID names no existing record.
    Dangling(String),
    Unset,
}

pub struct Session<S: StorageAdapter> {
    storage: S,
    settings: EngineSettings,
    evaluator: Evaluator,
    formulas: FormulaEngine,
    actions: HashMap<String, ButtonAction>,
    workspaces: Vec<Workspace>,
    current: usize,
    records: Vec<Record>,
}

impl<S: StorageAdapter> Session<S> {
    /// Initializes `storage` and loads the first workspace.
    ///
    /// An empty store is seeded with the default workspace
    /// ([`DEFAULT_WORKSPACE_ID`](crate::workspace::DEFAULT_WORKSPACE_ID)),
    /// named after [`EngineSettings::default_workspace_name`].
    pub fn open(mut storage: S, settings: EngineSettings) -> Result<Self> {
        storage.init()?;
        let workspaces = load_workspaces(&mut storage, &settings)?;
        let records = storage.get_records(&workspaces[0].id)?;
        log::debug!(
            "session opened on workspace '{}' with {} records",
            workspaces[0].id,
            records.len()
        );

        Ok(Self {
            evaluator: settings.evaluator(),
            storage,
            settings,
            formulas: FormulaEngine::new(),
            actions: HashMap::new(),
            workspaces,
            current: 0,
            records,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn workspaces(&self) -> &[Workspace] {
        &self.workspaces
    }

    pub fn current_workspace(&self) -> &Workspace {
        &self.workspaces[self.current]
    }

    /// Records of the current workspace in storage order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, record_id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == record_id)
    }

    /// Switches the current workspace and loads its records.
    pub fn set_active_workspace(&mut self, workspace_id: &str) -> Result<()> {
        let index = self
            .workspaces
            .iter()
            .position(|w| w.id == workspace_id)
            .ok_or_else(|| RecordbookError::WorkspaceNotFound(workspace_id.to_string()))?;
        let records = self.storage.get_records(workspace_id)?;
        self.current = index;
        self.records = records;
        Ok(())
    }

    /// Creates a workspace, persists it and makes it current. Returns its ID.
    pub fn add_workspace(
        &mut self,
        name: impl Into<String>,
        properties: Vec<PropertyDefinition>,
    ) -> Result<String> {
        let workspace = Workspace::new(name, properties);
        self.storage.save_workspace(&workspace)?;
        let id = workspace.id.clone();
        log::info!("created workspace '{}' ({id})", workspace.name);
        self.workspaces.push(workspace);
        self.set_active_workspace(&id)?;
        Ok(id)
    }

    /// Replaces the stored name, schema and rules of an existing workspace.
    pub fn save_workspace_schema(&mut self, workspace: Workspace) -> Result<()> {
        let index = self
            .workspaces
            .iter()
            .position(|w| w.id == workspace.id)
            .ok_or_else(|| RecordbookError::WorkspaceNotFound(workspace.id.clone()))?;
        self.storage.save_workspace(&workspace)?;
        self.workspaces[index] = workspace;
        Ok(())
    }

    /// Creates a record in the current workspace with property defaults
    /// applied. Returns its ID.
    pub fn create_record(&mut self, title: impl Into<String>) -> Result<String> {
        let workspace = self.current_workspace();
        let mut record = Record::new(&workspace.id, title);
        record.apply_defaults(&workspace.properties);
        let id = self.storage.save_record(&mut record)?;
        self.records.push(record);
        Ok(id)
    }

    /// Writes one property of one record, normalized through the field codec.
    ///
    /// # Errors
    ///
    /// [`RecordbookError::NotEditable`] for button and formula properties;
    /// lookup errors for unknown records or properties; storage errors, in
    /// which case the in-memory record is unchanged.
    pub fn update_field(&mut self, record_id: &str, property_id: &str, raw: &Value) -> Result<()> {
        let def = self.property(property_id)?.clone();
        if !def.property_type.is_editable() {
            return Err(RecordbookError::NotEditable(def.name));
        }
        let index = self.record_index(record_id)?;

        let mut updated = self.records[index].clone();
        updated.set_field(&def, raw);
        self.storage.save_record(&mut updated)?;
        log::debug!("record {record_id}: set '{}'", def.key());
        self.records[index] = updated;
        Ok(())
    }

    pub fn update_title(&mut self, record_id: &str, title: impl Into<String>) -> Result<()> {
        let index = self.record_index(record_id)?;
        let mut updated = self.records[index].clone();
        updated.title = title.into();
        self.storage.save_record(&mut updated)?;
        self.records[index] = updated;
        Ok(())
    }

    pub fn delete_record(&mut self, record_id: &str) -> Result<()> {
        let index = self.record_index(record_id)?;
        self.storage.delete_record(record_id)?;
        self.records.remove(index);
        Ok(())
    }

    /// Properties of the current schema visible for `record_id`, in schema order.
    pub fn visible_properties(&self, record_id: &str) -> Result<Vec<&PropertyDefinition>> {
        let record = &self.records[self.record_index(record_id)?];
        Ok(self
            .current_workspace()
            .visible_properties(record, &self.evaluator))
    }

    /// Builds the render contract for every visible property of `record_id`.
    ///
    /// Formula values are computed; a failing formula renders empty.
    pub fn field_views(&self, record_id: &str) -> Result<Vec<FieldView>> {
        let record = &self.records[self.record_index(record_id)?];
        let status_defaults = &self.settings.default_status_options;

        Ok(self
            .visible_properties(record_id)?
            .into_iter()
            .map(|def| {
                let value = self.field_value(record, def);
                FieldView {
                    hint: def.render_hint(status_defaults),
                    display: value.display(def),
                    editable: def.property_type.is_editable(),
                    property: def.clone(),
                    value,
                }
            })
            .collect())
    }

    /// Registers the handler run by buttons whose `action` is `name`.
    pub fn register_action<F>(&mut self, name: impl Into<String>, action: F)
    where
        F: Fn(&ButtonContext<'_>) -> Option<PropertyBag> + 'static,
    {
        self.actions.insert(name.into(), Box::new(action));
    }

    /// Runs the action bound to button `property_id` for `record_id`.
    ///
    /// Updates returned by the action are applied like [`update_field`]
    /// edits in a single storage write. Returns `true` when a write happened.
    ///
    /// [`update_field`]: Self::update_field
    pub fn press_button(&mut self, record_id: &str, property_id: &str) -> Result<bool> {
        let def = self.property(property_id)?;
        if def.property_type != PropertyType::Button {
            return Err(RecordbookError::InvalidArgument(format!(
                "'{}' is not a button",
                def.name
            )));
        }
        let action_name = def
            .action
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| RecordbookError::ActionNotFound(def.name.clone()))?;
        let action = self
            .actions
            .get(action_name)
            .ok_or_else(|| RecordbookError::ActionNotFound(action_name.to_string()))?;

        let index = self.record_index(record_id)?;
        let record = &self.records[index];
        let workspace = self.current_workspace();
        let context = ButtonContext {
            record,
            property: def,
            value: record.get_prop(def.key()),
            workspace,
        };
        let Some(updates) = action(&context) else {
            return Ok(false);
        };
        if updates.is_empty() {
            return Ok(false);
        }

        let mut updated = record.clone();
        for (key, raw) in &updates {
            let target = workspace
                .property(key)
                .ok_or_else(|| RecordbookError::PropertyNotFound(key.clone()))?;
            if !target.property_type.is_editable() {
                return Err(RecordbookError::NotEditable(target.name.clone()));
            }
            updated.set_field(target, raw);
        }
        self.storage.save_record(&mut updated)?;
        log::debug!("record {record_id}: button '{property_id}' wrote {} fields", updates.len());
        self.records[index] = updated;
        Ok(true)
    }

    /// Follows relation `property_id` of `record_id`.
    ///
    /// The declared target workspace is searched first, then every other
    /// workspace. A stored ID that matches nothing is
    /// [`RelationTarget::Dangling`], not an error.
    pub fn resolve_relation(&self, record_id: &str, property_id: &str) -> Result<RelationTarget> {
        let def = self.property(property_id)?;
        if def.property_type != PropertyType::Relation {
            return Err(RecordbookError::InvalidArgument(format!(
                "'{}' is not a relation",
                def.name
            )));
        }
        let record = &self.records[self.record_index(record_id)?];
        let FieldValue::Relation(Some(target_id)) = record.field(def) else {
            return Ok(RelationTarget::Unset);
        };

        let mut search_order: Vec<&str> = Vec::new();
        if let Some(preferred) = def.relation_workspace.as_deref() {
            search_order.push(preferred);
        }
        for workspace in &self.workspaces {
            if !search_order.contains(&workspace.id.as_str()) {
                search_order.push(&workspace.id);
            }
        }

        for workspace_id in search_order {
            let found = if workspace_id == self.current_workspace().id {
                self.records.iter().find(|r| r.id == target_id).cloned()
            } else {
                self.storage
                    .get_records(workspace_id)?
                    .into_iter()
                    .find(|r| r.id == target_id)
            };
            if let Some(record) = found {
                return Ok(RelationTarget::Resolved {
                    workspace_id: workspace_id.to_string(),
                    record,
                });
            }
        }
        log::debug!("record {record_id}: relation '{property_id}' points at missing {target_id}");
        Ok(RelationTarget::Dangling(target_id))
    }

    /// Records a relation picker should offer for `property_id`: the records
    /// of its target workspace, or of the current workspace when none is set.
    pub fn relation_candidates(&self, property_id: &str) -> Result<Vec<Record>> {
        let def = self.property(property_id)?;
        match def.relation_workspace.as_deref() {
            Some(id) if id != self.current_workspace().id => self.storage.get_records(id),
            _ => Ok(self.records.clone()),
        }
    }

    /// Kanban columns of the current workspace grouped by `property_id`.
    pub fn board(&self, property_id: &str) -> Result<Vec<BoardColumn>> {
        views::board(
            self.current_workspace(),
            &self.records,
            property_id,
            &self.settings.default_status_options,
        )
    }

    /// Agenda entries of the current workspace for the week holding `day`.
    pub fn agenda_week(&self, day: NaiveDate, date_key: &str, time_key: &str) -> Vec<AgendaEntry> {
        views::agenda_week(&self.records, views::start_of_week(day), date_key, time_key)
    }

    /// Re-reads workspaces and current records from storage, discarding any
    /// in-memory state. Stays on the current workspace when it still exists.
    pub fn reload(&mut self) -> Result<()> {
        let current_id = self.current_workspace().id.clone();
        let workspaces = load_workspaces(&mut self.storage, &self.settings)?;
        let current = workspaces
            .iter()
            .position(|w| w.id == current_id)
            .unwrap_or(0);
        let records = self.storage.get_records(&workspaces[current].id)?;
        self.workspaces = workspaces;
        self.current = current;
        self.records = records;
        Ok(())
    }

    pub fn export_data(&self) -> Result<ExportData> {
        self.storage.export_data()
    }

    /// Writes a full backup archive to `path`.
    pub fn export_archive(&self, path: &Path) -> Result<()> {
        export::write_archive(path, &self.storage.export_data()?)
    }

    /// Imports a backup archive into storage and reloads.
    pub fn import_archive(&mut self, path: &Path) -> Result<ImportSummary> {
        let data = export::read_archive(path)?;
        let summary = export::import_into(&mut self.storage, &data)?;
        self.reload()?;
        log::info!(
            "imported {} workspaces and {} records",
            summary.workspace_count,
            summary.record_count
        );
        Ok(summary)
    }

    fn property(&self, property_id: &str) -> Result<&PropertyDefinition> {
        self.current_workspace()
            .property(property_id)
            .ok_or_else(|| RecordbookError::PropertyNotFound(property_id.to_string()))
    }

    fn record_index(&self, record_id: &str) -> Result<usize> {
        self.records
            .iter()
            .position(|r| r.id == record_id)
            .ok_or_else(|| RecordbookError::RecordNotFound(record_id.to_string()))
    }

    fn field_value(&self, record: &Record, def: &PropertyDefinition) -> FieldValue {
        let expression = match (&def.property_type, def.formula.as_deref()) {
            (PropertyType::Formula, Some(expr)) if !expr.trim().is_empty() => expr,
            _ => return record.field(def),
        };
        match self.formulas.evaluate(expression, record) {
            Ok(text) => FieldValue::Text(text),
            Err(e) => {
                log::warn!("record {}: formula '{}' failed: {e}", record.id, def.name);
                FieldValue::Text(String::new())
            }
        }
    }
}

/// Loads all workspaces, seeding the default one into an empty store.
fn load_workspaces<S: StorageAdapter>(storage: &mut S, settings: &EngineSettings) -> Result<Vec<Workspace>> {
    let mut workspaces = storage.get_workspaces()?;
    if workspaces.is_empty() {
        let seed = Workspace::default_seed(&settings.default_workspace_name);
        storage.save_workspace(&seed)?;
        log::info!("seeded default workspace '{}'", seed.id);
        workspaces.push(seed);
    }
    Ok(workspaces)
}
