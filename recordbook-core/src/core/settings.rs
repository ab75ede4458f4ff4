//! Engine settings persistence.
//!
//! Settings live in a JSON file at an OS-appropriate location. A missing or
//! unreadable file yields defaults so the engine always starts.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::evaluator::{Evaluator, DEFAULT_MAX_DEPTH};
use crate::property::DEFAULT_STATUS_OPTIONS;
use crate::Result;

/// Persisted engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Nesting depth past which a condition is assumed satisfied.
    pub max_rule_depth: usize,
    /// Options offered by status properties that declare none.
    pub default_status_options: Vec<String>,
    /// SQLite file name, relative to the data directory.
    pub database_file: String,
    /// Name given to the workspace seeded into an empty store.
    pub default_workspace_name: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_rule_depth: DEFAULT_MAX_DEPTH,
            default_status_options: DEFAULT_STATUS_OPTIONS.iter().map(|s| s.to_string()).collect(),
            database_file: "recordbook.sqlite".to_string(),
            default_workspace_name: "Principal".to_string(),
        }
    }
}

impl EngineSettings {
    /// Builds an evaluator honouring `max_rule_depth`.
    pub fn evaluator(&self) -> Evaluator {
        Evaluator::new(self.max_rule_depth)
    }

    /// Resolves the database file against `data_dir`.
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.database_file)
    }
}

/// Returns the path to the settings JSON file.
///
/// - macOS / Linux: `~/.config/recordbook/settings.json`
/// - Windows: `%APPDATA%/Recordbook/settings.json`
pub fn settings_file_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("Recordbook").join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("recordbook").join("settings.json")
    }
}

/// Loads settings from the default location.
pub fn load_settings() -> EngineSettings {
    load_settings_from(&settings_file_path())
}

/// Loads settings from `path`; returns defaults if the file is missing or corrupt.
pub fn load_settings_from(path: &Path) -> EngineSettings {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("ignoring unreadable settings at {}: {e}", path.display());
            EngineSettings::default()
        }),
        Err(_) => EngineSettings::default(),
    }
}

/// Saves settings to `path`, creating parent directories as needed.
pub fn save_settings_to(path: &Path, settings: &EngineSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = load_settings_from(&dir.path().join("nope.json"));
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.max_rule_depth, 3);
        assert_eq!(settings.default_workspace_name, "Principal");
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = EngineSettings {
            max_rule_depth: 8,
            ..EngineSettings::default()
        };
        save_settings_to(&path, &settings).unwrap();

        let loaded = load_settings_from(&path);
        assert_eq!(loaded, settings);
        assert_eq!(loaded.evaluator().max_depth(), 8);
    }

    #[test]
    fn test_partial_and_corrupt_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        fs::write(&path, r#"{ "databaseFile": "otro.db" }"#).unwrap();
        let loaded = load_settings_from(&path);
        assert_eq!(loaded.database_file, "otro.db");
        assert_eq!(loaded.max_rule_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(
            loaded.database_path(Path::new("/data")),
            PathBuf::from("/data/otro.db")
        );

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_settings_from(&path), EngineSettings::default());
    }

    #[test]
    fn test_settings_path_ends_with_file_name() {
        assert!(settings_file_path().ends_with("settings.json"));
    }
}
