//! Storage adapters for workspaces and records.
//!
//! The engine does not depend on one persistence mechanism. [`StorageAdapter`]
//! is the whole contract; [`MemoryStorage`] keeps everything in process and
//! [`SqliteStorage`] persists to a SQLite file. Every call may fail and the
//! caller decides how to recover. No adapter offers an atomic
//! read-modify-write, so callers serialize writes to the same record.

use serde::{Deserialize, Serialize};

use crate::{Record, Result, Workspace};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// Version written into [`ExportData::version`].
pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// Current crate version, recorded in exports.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Full snapshot of a store, used for backups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub version: u32,
    pub app_version: String,
    pub workspaces: Vec<Workspace>,
    pub records: Vec<Record>,
}

impl ExportData {
    pub fn new(workspaces: Vec<Workspace>, records: Vec<Record>) -> Self {
        Self {
            version: EXPORT_FORMAT_VERSION,
            app_version: APP_VERSION.to_string(),
            workspaces,
            records,
        }
    }
}

/// Persistence contract consumed by [`Session`](crate::Session).
pub trait StorageAdapter {
    /// Prepares the store. Idempotent; returns `true` when this call created
    /// the underlying schema.
    fn init(&mut self) -> Result<bool>;

    /// All workspaces in creation order.
    fn get_workspaces(&self) -> Result<Vec<Workspace>>;

    /// Inserts or replaces a workspace by ID.
    fn save_workspace(&mut self, workspace: &Workspace) -> Result<()>;

    /// Records of one workspace in creation order.
    fn get_records(&self, workspace_id: &str) -> Result<Vec<Record>>;

    /// Inserts or replaces a record by ID, assigning an ID when it has none.
    /// Returns the record ID.
    fn save_record(&mut self, record: &mut Record) -> Result<String>;

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// Returns [`RecordbookError::RecordNotFound`](crate::RecordbookError::RecordNotFound)
    /// if no record has that ID.
    fn delete_record(&mut self, record_id: &str) -> Result<()>;

    /// Every workspace and record, including records whose workspace is gone.
    fn export_data(&self) -> Result<ExportData>;
}
