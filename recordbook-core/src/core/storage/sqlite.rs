//! SQLite-backed storage adapter.
//!
//! Property schemas, rule maps and record values are stored as JSON text
//! columns. Reads are defensive: a column that does not parse is logged and
//! read as empty instead of failing the whole query.

use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::Path;

use crate::settings::EngineSettings;

use crate::lookup::PropertyBag;
use crate::rules::RuleMap;
use crate::{PropertyDefinition, Record, RecordbookError, Result, Workspace};

use super::{ExportData, StorageAdapter};

type RecordRow = (String, String, String, String);

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database file at `path`.
    ///
    /// The schema is created by [`StorageAdapter::init`]; a file that is not a
    /// SQLite database fails there with [`RecordbookError::Database`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Opens the database named by `settings.database_file` inside `data_dir`,
    /// creating the directory if needed.
    pub fn open_with_settings(data_dir: &Path, settings: &EngineSettings) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        Self::open(settings.database_path(data_dir))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn table_count(&self) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type='table'
             AND name IN ('workspaces', 'records')",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn query_records(&self, sql: &str, workspace_id: Option<&str>) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row| -> rusqlite::Result<RecordRow> {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        };
        let rows = match workspace_id {
            Some(id) => stmt.query_map([id], map_row)?.collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt.query_map([], map_row)?.collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows.into_iter().map(record_from_row).collect())
    }
}

impl StorageAdapter for SqliteStorage {
    fn init(&mut self) -> Result<bool> {
        let created = self.table_count()? < 2;
        self.conn.execute_batch(include_str!("schema.sql"))?;
        if created {
            log::info!("created recordbook schema");
        }
        Ok(created)
    }

    fn get_workspaces(&self) -> Result<Vec<Workspace>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, properties, rules FROM workspaces ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .map(|(id, name, properties_json, rules_json)| Workspace {
                properties: decode_properties(&id, &properties_json),
                rules: rules_json.and_then(|raw| decode_rules(&id, &raw)),
                id,
                name,
            })
            .collect())
    }

    fn save_workspace(&mut self, workspace: &Workspace) -> Result<()> {
        let properties_json = serde_json::to_string(&workspace.properties)?;
        let rules_json = workspace
            .rules
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn.execute(
            "INSERT INTO workspaces (id, name, properties, rules) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                properties = excluded.properties,
                rules = excluded.rules",
            params![workspace.id, workspace.name, properties_json, rules_json],
        )?;
        Ok(())
    }

    fn get_records(&self, workspace_id: &str) -> Result<Vec<Record>> {
        self.query_records(
            "SELECT id, workspace_id, title, properties FROM records
             WHERE workspace_id = ?1 ORDER BY rowid",
            Some(workspace_id),
        )
    }

    fn save_record(&mut self, record: &mut Record) -> Result<String> {
        let id = record.ensure_id().to_string();
        let properties_json = serde_json::to_string(&record.properties)?;
        self.conn.execute(
            "INSERT INTO records (id, workspace_id, title, properties) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                workspace_id = excluded.workspace_id,
                title = excluded.title,
                properties = excluded.properties",
            params![id, record.workspace_id, record.title, properties_json],
        )?;
        Ok(id)
    }

    fn delete_record(&mut self, record_id: &str) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM records WHERE id = ?1", params![record_id])?;
        // DELETE on a missing row succeeds with zero changes.
        if deleted == 0 {
            return Err(RecordbookError::RecordNotFound(record_id.to_string()));
        }
        Ok(())
    }

    fn export_data(&self) -> Result<ExportData> {
        let workspaces = self.get_workspaces()?;
        let records = self.query_records(
            "SELECT id, workspace_id, title, properties FROM records ORDER BY rowid",
            None,
        )?;
        Ok(ExportData::new(workspaces, records))
    }
}

fn record_from_row((id, workspace_id, title, properties_json): RecordRow) -> Record {
    let properties = match serde_json::from_str::<Value>(&properties_json) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            log::warn!("record '{id}' has unreadable properties; reading as empty");
            PropertyBag::new()
        }
    };
    Record {
        id,
        workspace_id,
        title,
        properties,
    }
}

/// Parses a stored schema, keeping every definition that parses on its own.
fn decode_properties(workspace_id: &str, raw: &str) -> Vec<PropertyDefinition> {
    let items = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(Value::Null) => return Vec::new(),
        Ok(_) | Err(_) => {
            log::warn!("workspace '{workspace_id}' has an unreadable schema; reading as empty");
            return Vec::new();
        }
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<PropertyDefinition>(item) {
            Ok(def) => Some(def),
            Err(e) => {
                log::warn!("workspace '{workspace_id}': skipping unreadable property: {e}");
                None
            }
        })
        .collect()
}

fn decode_rules(workspace_id: &str, raw: &str) -> Option<RuleMap> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Null) => None,
        Ok(value) => Some(RuleMap::from_json(&value)),
        Err(e) => {
            log::warn!("workspace '{workspace_id}' has unreadable rules: {e}");
            None
        }
    }
}
