//! In-process storage adapter with no persistence.

use crate::{Record, RecordbookError, Result, Workspace};

use super::{ExportData, StorageAdapter};

/// Keeps workspaces and records in insertion-ordered vectors.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    initialized: bool,
    workspaces: Vec<Workspace>,
    records: Vec<Record>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-filled with `data`, e.g. from a backup.
    pub fn from_export(data: ExportData) -> Self {
        Self {
            initialized: true,
            workspaces: data.workspaces,
            records: data.records,
        }
    }
}

impl StorageAdapter for MemoryStorage {
    fn init(&mut self) -> Result<bool> {
        let created = !self.initialized;
        self.initialized = true;
        Ok(created)
    }

    fn get_workspaces(&self) -> Result<Vec<Workspace>> {
        Ok(self.workspaces.clone())
    }

    fn save_workspace(&mut self, workspace: &Workspace) -> Result<()> {
        match self.workspaces.iter_mut().find(|w| w.id == workspace.id) {
            Some(existing) => *existing = workspace.clone(),
            None => self.workspaces.push(workspace.clone()),
        }
        Ok(())
    }

    fn get_records(&self, workspace_id: &str) -> Result<Vec<Record>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    fn save_record(&mut self, record: &mut Record) -> Result<String> {
        let id = record.ensure_id().to_string();
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(existing) => *existing = record.clone(),
            None => self.records.push(record.clone()),
        }
        Ok(id)
    }

    fn delete_record(&mut self, record_id: &str) -> Result<()> {
        let before = self.records.len();
        self.records.retain(|r| r.id != record_id);
        if self.records.len() == before {
            return Err(RecordbookError::RecordNotFound(record_id.to_string()));
        }
        Ok(())
    }

    fn export_data(&self) -> Result<ExportData> {
        Ok(ExportData::new(self.workspaces.clone(), self.records.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_export_is_already_initialized() {
        let ws = Workspace::default_seed("Principal");
        let record = Record::new(&ws.id, "r");
        let mut storage = MemoryStorage::from_export(ExportData::new(vec![ws.clone()], vec![record]));

        assert!(!storage.init().unwrap());
        assert_eq!(storage.get_workspaces().unwrap(), vec![ws.clone()]);
        assert_eq!(storage.get_records(&ws.id).unwrap().len(), 1);
    }
}
