//! Error types for cbvfs_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using cbvfs_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while walking or uploading entries.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON decoding error.
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// A composite `{package}-{version}` name does not parse.
    #[error("Invalid versioned cookbook name: {name}")]
    NameGrammar { name: String },

    /// The backend listing call failed.
    #[error("Listing {path} failed: {reason}")]
    RemoteListing { path: String, reason: String },

    /// Staging directory or reference could not be created or removed.
    #[error("Staging I/O error at {path}: {source}")]
    StagingIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cookbook loader rejected the content.
    #[error("Failed to load cookbook at {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// The uploader rejected or failed the upload.
    #[error("Failed to upload cookbook {cookbook}: {reason}")]
    Upload { cookbook: String, reason: String },

    /// Operation requires a directory entry.
    #[error("Not a directory: {path}")]
    NotADirectory { path: String },

    /// Entry does not exist.
    #[error("Entry not found: {path}")]
    NotFound { path: String },

    /// Entry cannot be used as the source of an upload.
    #[error("Not a cookbook source: {path}")]
    NotACookbookSource { path: String },

    /// Repository configuration is invalid.
    #[error("Invalid config at {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    /// Ignore file could not be parsed.
    #[error("Invalid ignore file: {reason}")]
    Ignore { reason: String },
}

impl Error {
    /// Create a NameGrammar error.
    pub fn name_grammar(name: impl Into<String>) -> Self {
        Error::NameGrammar { name: name.into() }
    }

    /// Create a RemoteListing error.
    pub fn remote_listing(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::RemoteListing {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a StagingIo error.
    pub fn staging_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::StagingIo {
            path: path.into(),
            source,
        }
    }

    /// Create a Load error.
    pub fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an Upload error.
    pub fn upload(cookbook: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Upload {
            cookbook: cookbook.into(),
            reason: reason.into(),
        }
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Error::NotADirectory { path: path.into() }
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Error::NotFound { path: path.into() }
    }

    /// Create a NotACookbookSource error.
    pub fn not_a_cookbook_source(path: impl Into<String>) -> Self {
        Error::NotACookbookSource { path: path.into() }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<ignore::Error> for Error {
    fn from(err: ignore::Error) -> Self {
        // ignore::Error can wrap an io::Error or be a pattern error
        match err.io_error() {
            Some(io_err) => Error::Io {
                source: std::io::Error::new(io_err.kind(), io_err.to_string()),
            },
            None => Error::Ignore {
                reason: err.to_string(),
            },
        }
    }
}
