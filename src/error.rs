//! Error types for cavacrm
//!
//! Every storage engine translates its native failures into this one
//! taxonomy at its boundary, so callers never see a `rusqlite` or `reqwest`
//! error directly.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for cavacrm operations
#[derive(Debug, Error)]
pub enum Error {
    // ==========================================================================
    // Lookup Errors
    // ==========================================================================
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    #[error("No incident with code '{code}'")]
    IncidentCodeNotFound { code: String },

    #[error("No incident records for incident code '{code}'")]
    NoRecordsForCode { code: String },

    // ==========================================================================
    // Write Errors
    // ==========================================================================
    #[error("Incident code '{code}' already exists")]
    DuplicateKey { code: String },

    #[error("Integrity violation: {message}")]
    Integrity { message: String },

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Reset refused: {reason}")]
    ResetRefused { reason: &'static str },

    // ==========================================================================
    // Connectivity Errors
    // ==========================================================================
    #[error("Storage unreachable: {message}")]
    Connectivity { message: String },

    #[error("Remote request to '{table}' failed with status {status}: {body}")]
    RemoteStatus {
        table: String,
        status: u16,
        body: String,
    },

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ==========================================================================
    // IO Errors
    // ==========================================================================
    #[error("Failed to read file '{path}': {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ==========================================================================
    // Serialization Errors
    // ==========================================================================
    #[error("Failed to parse YAML: {message}")]
    YamlParseError { message: String },

    #[error("Failed to parse JSON: {message}")]
    JsonParseError { message: String },

    #[error("Failed to read CSV: {message}")]
    CsvError { message: String },

    #[error("Failed to write workbook: {message}")]
    WorkbookError { message: String },

    #[error("Failed to render template: {message}")]
    TemplateError { message: String },

    #[error("Filter parse error: {message}")]
    FilterParse { message: String },

    // ==========================================================================
    // Catch-all
    // ==========================================================================
    #[error("{0}")]
    Other(String),
}

/// Result type alias for cavacrm operations
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Conversions from external error types
// =============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::Integrity {
                    message: msg.clone().unwrap_or_else(|| err.to_string()),
                }
            }
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..) => Error::Integrity {
                message: err.to_string(),
            },
            _ => Error::Connectivity {
                message: err.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Error::Integrity {
                message: err.to_string(),
            };
        }
        Error::Connectivity {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::YamlParseError {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonParseError {
            message: err.to_string(),
        }
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::CsvError {
            message: err.to_string(),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Error::WorkbookError {
            message: err.to_string(),
        }
    }
}

impl From<tera::Error> for Error {
    fn from(err: tera::Error) -> Self {
        Error::TemplateError {
            message: err.to_string(),
        }
    }
}

impl From<pgrest::ParseError> for Error {
    fn from(err: pgrest::ParseError) -> Self {
        Error::FilterParse {
            message: err.to_string(),
        }
    }
}

impl From<crate::validation::ValidationError> for Error {
    fn from(err: crate::validation::ValidationError) -> Self {
        Error::Validation {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Error Display Helpers
// =============================================================================

impl Error {
    /// Returns a user-friendly suggestion for fixing the error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::DuplicateKey { .. } => {
                Some("Choose another code or leave it empty to generate one")
            }
            Error::IncidentCodeNotFound { .. } | Error::NoRecordsForCode { .. } => {
                Some("List incident types with: cavacrm incident list")
            }
            Error::Connectivity { .. } | Error::RemoteStatus { .. } => {
                Some("Check the database path or the remote URL and key, then retry")
            }
            Error::ResetRefused { .. } => {
                Some("Pass the configured access code with --access-code")
            }
            Error::Config { .. } => Some("Check cavacrm.yaml and the SUPABASE_* variables"),
            _ => None,
        }
    }

    /// Returns true if the user can fix this by changing the input and retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. }
                | Error::IncidentCodeNotFound { .. }
                | Error::NoRecordsForCode { .. }
                | Error::DuplicateKey { .. }
                | Error::Validation { .. }
                | Error::Connectivity { .. }
                | Error::FilterParse { .. }
        )
    }

    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Error::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn integrity(message: impl Into<String>) -> Self {
        Error::Integrity {
            message: message.into(),
        }
    }
}
