//! Error types for ml-folds crate.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while organizing samples into folds.
#[derive(Debug, Error)]
pub enum FoldError {
    /// Invalid run configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Label configuration could not be read or is inconsistent.
    #[error("label configuration error: {0}")]
    LabelConfig(String),

    /// A label pattern failed to compile.
    #[error("invalid label pattern {pattern:?} for class {class}: {reason}")]
    InvalidPattern {
        /// Class the pattern belongs to.
        class: String,
        /// The offending pattern.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// Malformed manifest row.
    #[error("manifest line {line}: {reason}")]
    Manifest {
        /// 1-based line number.
        line: usize,
        /// Reason for failure.
        reason: String,
    },

    /// A manifest label matched none of the configured classes.
    #[error("manifest line {line}: sample {id} has label {label:?} which matches no class")]
    UnmatchedLabel {
        /// 1-based line number.
        line: usize,
        /// Sample ID.
        id: String,
        /// Raw label string.
        label: String,
    },

    /// The shared patch store directory does not exist.
    #[error("patch store directory not found: {}", .0.display())]
    PatchStoreMissing(PathBuf),

    /// A sample id that cannot name a patch link.
    #[error("sample id {0:?} cannot name a patch link")]
    InvalidSampleId(String),

    /// A regular file occupies a link path.
    #[error("refusing to replace non-symlink file: {}", .0.display())]
    LinkConflict(PathBuf),

    /// IO error on a specific path.
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// IO error without path context.
    #[error("IO error: {0}")]
    Stream(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl FoldError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    /// Creates a label configuration error.
    #[must_use]
    pub fn label_config(reason: impl Into<String>) -> Self {
        Self::LabelConfig(reason.into())
    }

    /// Creates a manifest error.
    #[must_use]
    pub fn manifest(line: usize, reason: impl Into<String>) -> Self {
        Self::Manifest {
            line,
            reason: reason.into(),
        }
    }

    /// Creates an unmatched label error.
    #[must_use]
    pub fn unmatched_label(line: usize, id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::UnmatchedLabel {
            line,
            id: id.into(),
            label: label.into(),
        }
    }

    /// Returns a closure that wraps an IO error with `path`.
    ///
    /// Intended for `map_err`.
    pub fn at(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        move |source| Self::Io { path, source }
    }

    /// Returns `true` for errors raised before any file-system mutation.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::LabelConfig(_) | Self::InvalidPattern { .. }
        )
    }
}

impl From<serde_json::Error> for FoldError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for ml-folds operations.
pub type Result<T> = std::result::Result<T, FoldError>;
