//! Error types shared across the crate.

use std::path::PathBuf;

/// A failure confined to a single source file. The file is left out of the
/// symbol table; the rest of the project still builds.
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed syntax tree in '{path}': {message}")]
    Decode { path: PathBuf, message: String },
    #[error("'{path}' has no unit header")]
    MissingHeader { path: PathBuf },
    #[error("Unit '{name}' in '{path}' is already declared by another file")]
    DuplicateUnit { path: PathBuf, name: String },
    #[error("Syntax tree for '{path}' not found")]
    NotFound { path: PathBuf },
}

impl UnitError {
    pub fn path(&self) -> &PathBuf {
        match self {
            UnitError::Io { path, .. }
            | UnitError::Decode { path, .. }
            | UnitError::MissingHeader { path }
            | UnitError::DuplicateUnit { path, .. }
            | UnitError::NotFound { path } => path,
        }
    }
}

/// Raised for a single occurrence and caught by the caller; the occurrence
/// stays unresolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Ambiguous reference to '{name}' ({candidates} candidates)")]
    Ambiguous { name: String, candidates: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ReassociateError {
    #[error("No unit in the symbol table was built from '{0}'")]
    UnknownFile(PathBuf),
}
