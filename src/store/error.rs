//! Error types for timer state persistence.

use std::io;
use thiserror::Error;

/// Persistence error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Home directory not found.
    #[error("Failed to get home directory")]
    HomeDirectoryNotFound,

    /// Failed to create the state directory.
    #[error("Failed to create state directory: {0}")]
    DirectoryCreation(#[source] io::Error),

    /// Failed to read the state file.
    #[error("Failed to read state file: {0}")]
    Read(#[source] io::Error),

    /// Failed to write the state file.
    #[error("Failed to write state file: {0}")]
    Write(#[source] io::Error),

    /// Failed to remove the state file.
    #[error("Failed to remove state file: {0}")]
    Remove(#[source] io::Error),

    /// The state file could not be parsed or serialized.
    #[error("Invalid state file: {0}")]
    Format(#[source] serde_json::Error),
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, StoreError>;
