//! Error types for bsync-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.
//! Sync errors fall into two groups: structural errors (`InvalidPath`,
//! `RemoteList`) abort a sync before any transfer, while `LocalWalk` and
//! `Transfer` describe a single item and are collected into the sync result.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for bsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for bsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required configuration field is absent or empty
    #[error("Profile '{profile}' is missing required field '{field}'")]
    MissingField {
        profile: String,
        field: &'static str,
    },

    /// Invalid path or key, including paths that escape the sync root
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Profile not found
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network error (retryable)
    #[error("Network error: {0}")]
    Network(String),

    /// Conflict error
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Paginated listing of a bucket failed part way through
    #[error("Failed to list bucket '{bucket}': {source}")]
    RemoteList {
        bucket: String,
        #[source]
        source: Box<Error>,
    },

    /// A local subtree could not be read
    #[error("Cannot read {}: {message}", path.display())]
    LocalWalk { path: PathBuf, message: String },

    /// A single transfer action failed
    #[error("Transfer of {item} failed: {message}")]
    Transfer { item: String, message: String },

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_) => 2,                            // UsageError
            Error::Config(_) | Error::MissingField { .. } => 2,    // UsageError
            Error::TomlParse(_) | Error::InvalidUrl(_) => 2,       // UsageError
            Error::Network(_) => 3,                                // NetworkError
            Error::Auth(_) => 4,                                   // AuthError
            Error::NotFound(_) | Error::ProfileNotFound(_) => 5,   // NotFound
            Error::Conflict(_) => 6,                               // Conflict
            Error::RemoteList { source, .. } => source.exit_code(), // cause decides
            _ => 1,                                                // GeneralError
        }
    }
}
