use thiserror::Error;

use crate::types::VersionParseError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CvmError {
    #[error(transparent)]
    InvalidVersion(#[from] VersionParseError),

    #[error("Invalid version constraint '{input}': expected an operator (=, >, >=, <, <=) followed by X.Y.Z")]
    InvalidConstraint { input: String },

    #[error("'{name}' is a reserved keyword and cannot be used as an alias")]
    ReservedAlias { name: String },

    #[error("Invalid alias name '{name}': aliases must be a single word without path separators")]
    InvalidAliasName { name: String },

    #[error("Missing command: separate the command to run with `--`, e.g. `-- --version`")]
    MissingCommand,

    #[error("Invalid history id '{input}': expected a positive number")]
    InvalidHistoryId { input: String },

    #[error("Version not found: {version}")]
    VersionNotFound { version: String },

    #[error("Alias not found: {name}")]
    AliasNotFound { name: String },

    #[error("No installed version matches constraint {constraint}")]
    NoMatchingVersion { constraint: String },

    #[error("History entry not found: {id}")]
    HistoryEntryNotFound { id: String },

    #[error("No active version; run `cvm use <version>` first")]
    NoActiveVersion,

    #[error("No version given and no {marker} file found in the current directory")]
    MarkerFileNotFound { marker: String },

    #[error("Version {version} is blocked and cannot be activated")]
    Blocked { version: String },

    #[error("Installation failed during {phase}: {details}")]
    InstallFailed {
        phase: &'static str,
        details: String,
    },

    #[error("Network error during {operation}: {details}")]
    Network {
        operation: &'static str,
        details: String,
    },

    #[error("IO error ({kind}): {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },

    #[error("Failed to read {what}: {details}")]
    Serialization {
        what: &'static str,
        details: String,
    },

    #[error("Shim generation failed: {details}")]
    Shim { details: String },
}

/// Coarse classification used by the CLI to pick exit codes and by callers
/// that only care about the family of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UserInput,
    NotFound,
    Blocked,
    Environment,
}

impl CvmError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidVersion(_)
            | Self::InvalidConstraint { .. }
            | Self::ReservedAlias { .. }
            | Self::InvalidAliasName { .. }
            | Self::MissingCommand
            | Self::InvalidHistoryId { .. } => ErrorKind::UserInput,
            Self::VersionNotFound { .. }
            | Self::AliasNotFound { .. }
            | Self::NoMatchingVersion { .. }
            | Self::HistoryEntryNotFound { .. }
            | Self::NoActiveVersion
            | Self::MarkerFileNotFound { .. } => ErrorKind::NotFound,
            Self::Blocked { .. } => ErrorKind::Blocked,
            Self::InstallFailed { .. }
            | Self::Network { .. }
            | Self::Io { .. }
            | Self::Serialization { .. }
            | Self::Shim { .. } => ErrorKind::Environment,
        }
    }

    pub fn version_not_found(version: impl ToString) -> Self {
        Self::VersionNotFound {
            version: version.to_string(),
        }
    }

    pub fn install_failed(phase: &'static str, details: impl Into<String>) -> Self {
        Self::InstallFailed {
            phase,
            details: details.into(),
        }
    }

    pub fn network(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Network {
            operation,
            details: details.into(),
        }
    }

    pub fn network_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::network(operation, error.to_string())
    }

    pub fn serialization_from<E>(what: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::Serialization {
            what,
            details: error.to_string(),
        }
    }
}

impl From<std::io::Error> for CvmError {
    fn from(err: std::io::Error) -> Self {
        CvmError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
