//! Error types for the Recordbook core library.

use thiserror::Error;

/// All errors that can occur within the Recordbook core library.
///
/// Malformed conditions and rules are not errors: the evaluator resolves them
/// as satisfied. Only collaborator failures and programmer errors at the
/// untyped boundary surface here.
#[derive(Debug, Error)]
pub enum RecordbookError {
    /// A SQLite operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored data could not be serialized or deserialized as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading or writing a backup archive failed.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A caller passed a value of the wrong shape, e.g. a record that is not a JSON object.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A workspace ID was requested that does not exist.
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    /// A record ID was requested that does not exist.
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// A property ID is not part of the workspace schema.
    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    /// The property holds no user-editable value (button or formula).
    #[error("Property is not editable: {0}")]
    NotEditable(String),

    /// A button was pressed whose action name has no registered handler.
    #[error("Button action not registered: {0}")]
    ActionNotFound(String),

    /// A formula expression failed to compile or evaluate.
    #[error("Formula error: {0}")]
    Formula(String),

    /// A backup archive is missing its data entry or has an unsupported version.
    #[error("Invalid export: {0}")]
    InvalidExport(String),
}

/// Convenience alias that pins the error type to [`RecordbookError`].
pub type Result<T> = std::result::Result<T, RecordbookError>;

impl RecordbookError {
    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Database(e) => format!("Failed to save: {e}"),
            Self::Json(e) => format!("Data format error: {e}"),
            Self::Io(e) => format!("File error: {e}"),
            Self::Zip(e) => format!("Backup archive error: {e}"),
            Self::InvalidArgument(msg) => msg.clone(),
            Self::WorkspaceNotFound(_) => "Workspace no longer exists".to_string(),
            Self::RecordNotFound(_) => "Record no longer exists".to_string(),
            Self::PropertyNotFound(id) => format!("Unknown property: {id}"),
            Self::NotEditable(name) => format!("'{name}' cannot be edited"),
            Self::ActionNotFound(name) => format!("No action named '{name}'"),
            Self::Formula(e) => format!("Formula error: {e}"),
            Self::InvalidExport(msg) => format!("Not a valid backup: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_message_passes_through() {
        let e = RecordbookError::InvalidArgument("record must be an object".to_string());
        assert_eq!(e.user_message(), "record must be an object");
        assert!(e.to_string().starts_with("Invalid argument"));
    }

    #[test]
    fn test_not_found_variants_hide_ids_from_users() {
        let e = RecordbookError::RecordNotFound("rec-123".to_string());
        assert!(!e.user_message().contains("rec-123"));
        assert!(e.to_string().contains("rec-123"));
    }
}
