//! Error types for the kvsync engine.

use crate::EntryName;
use thiserror::Error;

/// All possible errors from the kvsync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("entry name must not be empty")]
    EmptyName,

    #[error("duplicate entry name in desired state: {0}")]
    DuplicateName(EntryName),

    #[error("invalid value for entry '{name}': expected string, number or boolean, got {got}")]
    InvalidValue { name: EntryName, got: String },

    // State errors
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
