//! Backup archives: a store snapshot as a `.zip` holding `data.json`.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::storage::{ExportData, StorageAdapter, EXPORT_FORMAT_VERSION};
use crate::{RecordbookError, Result};

/// Name of the archive entry holding the snapshot.
pub const DATA_ENTRY: &str = "data.json";

/// Counts reported after reading or importing an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub app_version: String,
    pub workspace_count: usize,
    pub record_count: usize,
}

impl ImportSummary {
    pub fn of(data: &ExportData) -> Self {
        Self {
            app_version: data.app_version.clone(),
            workspace_count: data.workspaces.len(),
            record_count: data.records.len(),
        }
    }
}

/// Writes `data` to a new archive at `path`, replacing any existing file.
pub fn write_archive(path: &Path, data: &ExportData) -> Result<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(DATA_ENTRY, options)?;
    zip.write_all(&serde_json::to_vec_pretty(data)?)?;
    zip.finish()?;

    log::info!(
        "wrote backup with {} workspaces and {} records to {}",
        data.workspaces.len(),
        data.records.len(),
        path.display()
    );
    Ok(())
}

/// Reads a snapshot back from an archive written by [`write_archive`].
///
/// # Errors
///
/// [`RecordbookError::InvalidExport`] if the archive has no `data.json`, or
/// its version is missing or newer than [`EXPORT_FORMAT_VERSION`].
/// [`RecordbookError::Zip`] if the file is not a zip archive.
pub fn read_archive(path: &Path) -> Result<ExportData> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut entry = match archive.by_name(DATA_ENTRY) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(RecordbookError::InvalidExport(format!("missing {DATA_ENTRY}")))
        }
        Err(e) => return Err(e.into()),
    };
    let mut json = String::new();
    entry.read_to_string(&mut json)?;

    let raw: Value = serde_json::from_str(&json)?;
    let version = raw
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| RecordbookError::InvalidExport("missing version".to_string()))?;
    if version > u64::from(EXPORT_FORMAT_VERSION) {
        return Err(RecordbookError::InvalidExport(format!(
            "version {version} is newer than supported version {EXPORT_FORMAT_VERSION}"
        )));
    }
    Ok(serde_json::from_value(raw)?)
}

/// Upserts every workspace and record of `data` into `storage`.
///
/// Existing rows with the same IDs are replaced; other rows are left alone.
pub fn import_into<S: StorageAdapter>(storage: &mut S, data: &ExportData) -> Result<ImportSummary> {
    storage.init()?;
    for workspace in &data.workspaces {
        storage.save_workspace(workspace)?;
    }
    for record in &data.records {
        let mut record = record.clone();
        storage.save_record(&mut record)?;
    }
    Ok(ImportSummary::of(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::{PropertyDefinition, PropertyType, Record, Workspace};
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> ExportData {
        let ws = Workspace::new(
            "Tareas",
            vec![PropertyDefinition::new("estado", "Estado", PropertyType::Status)],
        );
        let mut record = Record::new(&ws.id, "Primera");
        record.properties.insert("estado".into(), json!("Pendiente"));
        ExportData::new(vec![ws], vec![record])
    }

    #[test]
    fn test_archive_round_trip_and_import() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup.zip");
        let data = sample();

        write_archive(&path, &data).unwrap();
        let read = read_archive(&path).unwrap();
        assert_eq!(read, data);

        let mut storage = MemoryStorage::new();
        let summary = import_into(&mut storage, &read).unwrap();
        assert_eq!(summary.workspace_count, 1);
        assert_eq!(summary.record_count, 1);
        assert_eq!(storage.export_data().unwrap().records, data.records);
    }

    #[test]
    fn test_archive_without_data_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("other.zip");
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("notes.json", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"{}").unwrap();
        zip.finish().unwrap();

        assert!(matches!(read_archive(&path), Err(RecordbookError::InvalidExport(_))));
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("future.zip");
        let mut data = sample();
        data.version = EXPORT_FORMAT_VERSION + 1;
        write_archive(&path, &data).unwrap();

        match read_archive(&path) {
            Err(RecordbookError::InvalidExport(msg)) => assert!(msg.contains("newer")),
            other => panic!("expected InvalidExport, got {other:?}"),
        }
    }

    #[test]
    fn test_non_zip_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.zip");
        std::fs::write(&path, "definitely not a zip archive").unwrap();
        assert!(matches!(read_archive(&path), Err(RecordbookError::Zip(_))));
    }
}
